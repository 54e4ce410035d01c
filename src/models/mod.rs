pub mod document;
pub mod source_file;
pub mod stage;

pub use document::{
    DocumentDescriptor, DocumentId, DocumentStatus, PipelineMessage, PipelineStatus,
    UploadResponse,
};
pub use source_file::{FileInfo, SourceFile};
pub use stage::Stage;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Client-generated id of a tracked item, unique within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Idle,
    Uploading,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }

    /// Legal moves: `idle -> uploading -> processing -> {done, error}`, plus
    /// `uploading -> error` when the upload itself fails. Staying in
    /// `processing` is allowed; every other self-transition is not.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Idle, Uploading)
                | (Uploading, Processing)
                | (Uploading, Error)
                | (Processing, Processing)
                | (Processing, Done)
                | (Processing, Error)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Client-side record of one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedItem {
    pub id: ItemId,
    pub file: FileInfo,
    /// 0-100; only meaningful while `status` is `uploading`.
    pub upload_progress: u8,
    pub remote_document_id: Option<DocumentId>,
    pub stage: Stage,
    pub status: ItemStatus,
    /// Present iff `status` is `error`.
    pub error_message: Option<String>,
    pub live_preview_text: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl TrackedItem {
    pub fn new(id: ItemId, file: FileInfo) -> Self {
        Self {
            id,
            file,
            upload_progress: 0,
            remote_document_id: None,
            stage: Stage::Uploading,
            status: ItemStatus::Idle,
            error_message: None,
            live_preview_text: None,
            added_at: Utc::now(),
        }
    }

    pub fn stage_index(&self) -> usize {
        self.stage.index()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// One-line status text for the item's row.
    pub fn status_line(&self) -> String {
        match self.status {
            ItemStatus::Idle => "Queued".to_string(),
            ItemStatus::Uploading => format!("Uploading {}%", self.upload_progress),
            ItemStatus::Processing => format!("{}…", self.stage.label()),
            ItemStatus::Done => "Ready for querying".to_string(),
            ItemStatus::Error => self
                .error_message
                .clone()
                .unwrap_or_else(|| "Failed".to_string()),
        }
    }
}
