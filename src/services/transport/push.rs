use super::TransportAdapter;
use crate::models::DocumentId;
use crate::services::pipeline_client::PipelineApi;
use crate::services::reducer::TrackingEvent;
use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;

pub const STREAM_CONNECTION_ERROR: &str = "Event stream connection error.";

/// Follows the server-sent event channel of a document.
///
/// No reconnection: a channel fault before a terminal status ends tracking
/// with [`STREAM_CONNECTION_ERROR`].
pub struct PushAdapter {
    api: Arc<dyn PipelineApi>,
}

impl PushAdapter {
    pub fn new(api: Arc<dyn PipelineApi>) -> Self {
        Self { api }
    }
}

impl TransportAdapter for PushAdapter {
    fn name(&self) -> &'static str {
        "push"
    }

    fn track(&self, document_id: DocumentId) -> BoxStream<'static, TrackingEvent> {
        let mut messages = self.api.document_events(document_id);

        Box::pin(stream! {
            while let Some(message) = messages.next().await {
                match message {
                    Ok(message) => {
                        let event = TrackingEvent::from_message(&message);
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            tracing::debug!("Closing event stream for document {}", document_id);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Event stream for document {} failed: {}", document_id, e);
                        yield TrackingEvent::failed(STREAM_CONNECTION_ERROR);
                        return;
                    }
                }
            }

            tracing::warn!(
                "Event stream for document {} ended before a final status",
                document_id
            );
            yield TrackingEvent::failed(STREAM_CONNECTION_ERROR);
        })
    }
}
