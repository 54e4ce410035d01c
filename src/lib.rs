pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::{PollSettings, TrackerConfig, TransportMode};
pub use crate::error::{Result, TrackerError};
pub use crate::models::{ItemId, ItemStatus, SourceFile, Stage, TrackedItem};
pub use crate::services::pipeline_client::{HttpPipelineClient, PipelineApi};
pub use crate::services::queue::UploadQueue;
pub use crate::services::transport::{TransportAdapter, create_transport};

use std::sync::Arc;

/// Builds an HTTP-backed queue using the transport selected in `config`.
pub fn queue_from_config(config: &TrackerConfig) -> Result<UploadQueue> {
    let api: Arc<dyn PipelineApi> = Arc::new(HttpPipelineClient::from_config(config)?);
    let transport = create_transport(config.transport, api.clone(), config.poll);
    Ok(UploadQueue::new(api, transport))
}
