//! services/client/src/adapters/image_file.rs
//!
//! Resolves a captured photo that was saved to disk instead of being handed
//! over in memory. Implements the `ImageLoader` port.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use snapsolve_core::domain::{CapturedImage, ImageRef};
use snapsolve_core::ports::{ImageLoader, PortError, PortResult};
use tracing::{debug, error};

/// Reads image files and base64-encodes them.
#[derive(Clone, Debug, Default)]
pub struct FsImageLoader;

impl FsImageLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, reference: &ImageRef) -> PortResult<CapturedImage> {
        let path = &reference.0;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to read captured image");
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    PortError::Unexpected(format!("image not found: {}", path.display()))
                }
                _ => PortError::Unexpected(e.to_string()),
            }
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Loaded captured image");
        Ok(CapturedImage::new(STANDARD.encode(bytes)))
    }
}
