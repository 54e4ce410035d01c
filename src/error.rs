use crate::models::ItemId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Event stream error: {0}")]
    Stream(String),

    #[error("Unsupported file type '{extension}' for '{file_name}'. Allowed: {allowed}")]
    UnsupportedFileType {
        file_name: String,
        extension: String,
        allowed: String,
    },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Item {0} is still in progress and cannot be removed")]
    ItemNotTerminal(ItemId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Human-readable detail supplied by the server, if any.
    pub fn server_detail(&self) -> Option<&str> {
        match self {
            TrackerError::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
