//! Pure merge of transport events into a tracked item.
//!
//! Both transports emit [`TrackingEvent`]s and both go through [`reduce`], so
//! the rest of the crate cannot tell which one produced a given state.

use crate::models::{ItemStatus, PipelineMessage, PipelineStatus, Stage, TrackedItem};

pub const GENERIC_PIPELINE_FAILURE: &str = "Processing failed.";

/// A progress update for one item, already mapped onto the stage model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingEvent {
    /// Candidate stage; `None` when the step name was unknown or absent.
    pub stage: Option<Stage>,
    /// `None` is treated as still processing.
    pub status: Option<PipelineStatus>,
    pub preview_text: Option<String>,
    pub error_message: Option<String>,
}

impl TrackingEvent {
    pub fn from_message(message: &PipelineMessage) -> Self {
        let stage = message.step.as_deref().and_then(Stage::from_step_name);
        if stage.is_none() {
            if let Some(step) = message.step.as_deref() {
                tracing::debug!("Ignoring unknown pipeline step '{}' for indexing", step);
            }
        }
        Self {
            stage,
            status: message.status,
            preview_text: message.ocr_text.clone().filter(|t| !t.is_empty()),
            error_message: message.error.clone().filter(|t| !t.is_empty()),
        }
    }

    pub fn advance(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn completed(stage: Option<Stage>) -> Self {
        Self {
            stage,
            status: Some(PipelineStatus::Completed),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(PipelineStatus::Failed),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn item_status(&self) -> ItemStatus {
        match self.status {
            Some(PipelineStatus::Completed) => ItemStatus::Done,
            Some(PipelineStatus::Failed) => ItemStatus::Error,
            _ => ItemStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.item_status().is_terminal()
    }
}

/// Folds one event into the previous state of an item.
///
/// Only `processing` items change. The stage never moves backwards, the
/// preview text is replaced only by a new non-empty one, and an error
/// message is recorded only together with the `error` status.
pub fn reduce(previous: &TrackedItem, event: &TrackingEvent) -> TrackedItem {
    if previous.status != ItemStatus::Processing {
        return previous.clone();
    }

    let mut next = previous.clone();

    if let Some(candidate) = event.stage {
        next.stage = next.stage.max(candidate);
    }

    next.status = event.item_status();

    if let Some(text) = &event.preview_text {
        next.live_preview_text = Some(text.clone());
    }

    match next.status {
        ItemStatus::Error => {
            next.error_message = Some(
                event
                    .error_message
                    .clone()
                    .unwrap_or_else(|| GENERIC_PIPELINE_FAILURE.to_string()),
            );
        }
        _ => {
            if let Some(detail) = &event.error_message {
                tracing::warn!(
                    "Item {} received error detail without a failed status: {}",
                    previous.id,
                    detail
                );
            }
        }
    }

    next
}
