//! Preview thumbnails.

use super::ffmpeg::extract_thumbnail;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Renders a preview image for a media file.
#[async_trait]
pub trait PreviewGenerator: Send + Sync {
    async fn generate(&self, media_path: &Path, dest: &Path) -> Result<()>;
}

/// Grabs one frame with ffmpeg.
pub struct FfmpegPreview {
    at_seconds: f64,
}

impl FfmpegPreview {
    pub fn new(at_seconds: f64) -> Self {
        Self { at_seconds }
    }
}

impl Default for FfmpegPreview {
    fn default() -> Self {
        Self::new(5.0)
    }
}

#[async_trait]
impl PreviewGenerator for FfmpegPreview {
    async fn generate(&self, media_path: &Path, dest: &Path) -> Result<()> {
        extract_thumbnail(media_path, dest, self.at_seconds).await
    }
}
