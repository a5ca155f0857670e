//! Image captioning port.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("image captioning failed: {0}")]
pub struct CaptionError(pub String);

/// Produces a short text description of an image.
///
/// Only consulted when image descriptions are enabled.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    /// Describe a base64-encoded image. `Ok(None)` means no description.
    async fn describe(&self, data: &str, mime_type: &str) -> Result<Option<String>, CaptionError>;
}

/// Captioner that never describes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCaptioner;

#[async_trait]
impl ImageCaptioner for NoopCaptioner {
    async fn describe(&self, _data: &str, _mime_type: &str) -> Result<Option<String>, CaptionError> {
        Ok(None)
    }
}
