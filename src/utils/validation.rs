use crate::error::{Result, TrackerError};
use std::path::Path;

/// Extensions the pipeline accepts: scanned images and PDFs.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "pdf"];

/// Returns the lower-cased extension of `file_name` if it is on the
/// allow-list.
pub fn validate_extension(file_name: &str) -> Result<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(ext);
    }

    Err(TrackerError::UnsupportedFileType {
        file_name: file_name.to_string(),
        extension: if ext.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{}", ext)
        },
        allowed: ALLOWED_EXTENSIONS
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Maps an allowed extension to the content type sent with the upload.
pub fn content_type_for(file_name: &str) -> mime::Mime {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("tif") | Some("tiff") => "image/tiff"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Strips any directory components so only the bare file name is sent.
pub fn upload_file_name(name: &str) -> String {
    let bare = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if bare.is_empty() {
        tracing::warn!("Empty file name derived from '{}'", name);
        return "upload".to_string();
    }
    bare.to_string()
}
