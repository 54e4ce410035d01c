use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned document id.
pub type DocumentId = i64;

/// Authoritative processing status reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

/// Document descriptor returned by `POST /upload` and `GET /documents/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub id: DocumentId,
    pub status: DocumentStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub page_count: Option<i64>,
    #[serde(default)]
    pub chunk_count: Option<i64>,
    #[serde(default)]
    pub ocr_confidence_avg: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub document: Option<DocumentDescriptor>,
}

impl UploadResponse {
    pub fn document_id(&self) -> Option<DocumentId> {
        self.document.as_ref().map(|d| d.id)
    }
}

/// Status field of a push-channel message. Anything unrecognised counts as
/// still processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// One message from `GET /documents/{id}/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMessage {
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub status: Option<PipelineStatus>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// FastAPI error body: `detail` is a string for handled errors and a list
/// for request validation failures.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string),
            _ => None,
        }
    }
}
