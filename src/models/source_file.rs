use crate::error::Result;
use crate::utils::validation::{content_type_for, upload_file_name};
use bytes::Bytes;
use serde::Serialize;
use std::path::Path;

/// The bytes of one file queued for upload, owned by its tracked item.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    content_type: mime::Mime,
    data: Bytes,
}

impl SourceFile {
    pub fn new(name: impl AsRef<str>, data: impl Into<Bytes>) -> Self {
        let name = upload_file_name(name.as_ref());
        let content_type = content_type_for(&name);
        Self {
            name,
            content_type,
            data: data.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(path.to_string_lossy(), data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &mime::Mime {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            content_type: self.content_type.to_string(),
            size: self.size(),
        }
    }
}

/// Display metadata of a queued file, kept on the tracked item after the
/// bytes have been handed to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}
