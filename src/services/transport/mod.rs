pub mod poll;
pub mod push;

pub use poll::PollAdapter;
pub use push::PushAdapter;

use crate::config::{PollSettings, TransportMode};
use crate::models::DocumentId;
use crate::services::pipeline_client::PipelineApi;
use crate::services::reducer::TrackingEvent;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Source of progress events for one uploaded document.
///
/// The returned stream ends right after it yields a terminal event, and every
/// implementation guarantees it yields one before ending. Dropping the stream
/// releases whatever the adapter holds for that document (connections,
/// timers).
pub trait TransportAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn track(&self, document_id: DocumentId) -> BoxStream<'static, TrackingEvent>;
}

/// Factory function to create the adapter selected by configuration
pub fn create_transport(
    mode: TransportMode,
    api: Arc<dyn PipelineApi>,
    poll: PollSettings,
) -> Arc<dyn TransportAdapter> {
    match mode {
        TransportMode::Push => Arc::new(PushAdapter::new(api)),
        TransportMode::Poll => Arc::new(PollAdapter::new(api, poll)),
    }
}
