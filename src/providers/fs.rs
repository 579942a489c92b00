//! Filesystem media library.
//!
//! Image ids are relative paths under a root directory. Absolute paths and
//! `..` components are rejected before touching the disk.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::traits::ImageSource;
use crate::types::{ImageData, MAX_IMAGE_BYTES, mime_from_extension};
use crate::{HeimdallError, Result};

/// `ImageSource` backed by files under a root directory.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an id to a path inside the root.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.trim().is_empty() || escapes {
            return Err(HeimdallError::InvalidInput(format!(
                "image id '{id}' is not a relative path inside the library"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn load(&self, id: &str) -> Result<ImageData> {
        let path = self.resolve(id)?;
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_from_extension)
            .ok_or_else(|| {
                HeimdallError::UnsupportedImage(format!("'{id}' has no supported image extension"))
            })?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(HeimdallError::ImageNotFound(id.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HeimdallError::ImageNotFound(id.to_string()));
            }
            Err(e) => return Err(HeimdallError::unclassified(e)),
        };
        if metadata.len() > MAX_IMAGE_BYTES as u64 {
            return Err(HeimdallError::UnsupportedImage(format!(
                "'{id}' is {} bytes, limit is {MAX_IMAGE_BYTES}",
                metadata.len()
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(HeimdallError::unclassified)?;
        debug!(id, bytes = bytes.len(), mime, "loaded image from library");
        Ok(ImageData::new(bytes, mime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_escaping_ids() {
        let source = FsImageSource::new("/srv/media");
        for id in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(source.resolve(id), Err(HeimdallError::InvalidInput(_))),
                "{id}"
            );
        }
        assert_eq!(
            source.resolve("albums/cat.jpg").unwrap(),
            PathBuf::from("/srv/media/albums/cat.jpg")
        );
    }
}
