use super::TransportAdapter;
use crate::config::PollSettings;
use crate::error::Result;
use crate::models::{DocumentDescriptor, DocumentId, DocumentStatus, Stage};
use crate::services::pipeline_client::PipelineApi;
use crate::services::reducer::{GENERIC_PIPELINE_FAILURE, TrackingEvent};
use async_stream::stream;
use futures::FutureExt;
use futures::future::{BoxFuture, Fuse, FusedFuture};
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Shortest cadence the adapter will run either timer at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Approximates progress for servers without an event channel.
///
/// Two cadences run side by side: a cosmetic stage advance that never goes
/// past [`Stage::LAST_SIMULATED`], and a slower authoritative status check
/// whose terminal result always wins. A status request in flight does not
/// hold back the stage advance. After `max_status_polls` checks without a
/// terminal status the document is failed as stalled.
pub struct PollAdapter {
    api: Arc<dyn PipelineApi>,
    settings: PollSettings,
}

enum Tick {
    Advance,
    Poll,
    Status(Result<DocumentDescriptor>),
}

impl PollAdapter {
    pub fn new(api: Arc<dyn PipelineApi>, settings: PollSettings) -> Self {
        let settings = PollSettings {
            stage_advance_interval: settings.stage_advance_interval.max(MIN_INTERVAL),
            status_poll_interval: settings.status_poll_interval.max(MIN_INTERVAL),
            ..settings
        };
        Self { api, settings }
    }
}

pub fn stalled_message(attempts: u32) -> String {
    format!(
        "Processing did not finish after {} status checks; giving up.",
        attempts
    )
}

/// Event for a document whose status is already terminal.
fn finished(doc: DocumentDescriptor) -> TrackingEvent {
    match doc.status {
        DocumentStatus::Completed => TrackingEvent::completed(Some(Stage::Done)),
        _ => TrackingEvent::failed(
            doc.error_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_PIPELINE_FAILURE.to_string()),
        ),
    }
}

impl TransportAdapter for PollAdapter {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn track(&self, document_id: DocumentId) -> BoxStream<'static, TrackingEvent> {
        let api = self.api.clone();
        let settings = self.settings;

        Box::pin(stream! {
            let start = Instant::now();
            let mut advance = interval_at(
                start + settings.stage_advance_interval,
                settings.stage_advance_interval,
            );
            advance.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut poll = interval_at(
                start + settings.status_poll_interval,
                settings.status_poll_interval,
            );
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut in_flight: Fuse<BoxFuture<'static, Result<DocumentDescriptor>>> =
                Fuse::terminated();
            let mut simulated = Stage::Preprocessing;
            let mut attempts: u32 = 0;

            loop {
                let tick = tokio::select! {
                    _ = advance.tick(), if simulated < Stage::LAST_SIMULATED => Tick::Advance,
                    _ = poll.tick(), if in_flight.is_terminated() => Tick::Poll,
                    result = &mut in_flight, if !in_flight.is_terminated() => Tick::Status(result),
                };

                match tick {
                    Tick::Advance => {
                        if let Some(next) = simulated.next() {
                            simulated = next.min(Stage::LAST_SIMULATED);
                            yield TrackingEvent::advance(simulated);
                        }
                    }
                    Tick::Poll => {
                        attempts += 1;
                        let api = api.clone();
                        in_flight = async move { api.document_status(document_id).await }
                            .boxed()
                            .fuse();
                    }
                    Tick::Status(result) => {
                        match result {
                            Ok(doc) if doc.status.is_terminal() => {
                                tracing::debug!(
                                    "Document {} is {:?} after {} status checks",
                                    document_id,
                                    doc.status,
                                    attempts
                                );
                                yield finished(doc);
                                return;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(
                                    "Status check {} for document {} failed: {}",
                                    attempts,
                                    document_id,
                                    e
                                );
                            }
                        }

                        if attempts >= settings.max_status_polls {
                            tracing::warn!(
                                "Document {} still not finished after {} status checks",
                                document_id,
                                attempts
                            );
                            yield TrackingEvent::failed(stalled_message(attempts));
                            return;
                        }
                    }
                }
            }
        })
    }
}
