//! Image payloads handed to remote calls

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::{HeimdallError, Result};

/// Largest image accepted for analysis (20 MiB).
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// MIME types the vision endpoint accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Raw image bytes plus MIME type. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Check MIME type and size limits.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(HeimdallError::UnsupportedImage(format!(
                "MIME type '{}' is not supported",
                self.mime_type
            )));
        }
        if self.bytes.is_empty() {
            return Err(HeimdallError::UnsupportedImage("image is empty".to_string()));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(HeimdallError::UnsupportedImage(format!(
                "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
                self.bytes.len()
            )));
        }
        Ok(())
    }

    /// Base64 encoding of the bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URI for inline transport.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Guess a MIME type from a file extension.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// A decoded video frame with its position in the video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Seconds from the start of the video.
    pub timestamp: f64,
    pub image: ImageData,
}

impl VideoFrame {
    pub fn new(timestamp: f64, image: ImageData) -> Self {
        Self { timestamp, image }
    }
}
