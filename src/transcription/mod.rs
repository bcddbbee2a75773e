//! Speech-to-text for uploaded media.
//!
//! The transcriber is a blocking step from the ingestion worker's point of
//! view: once started it runs to completion and cannot be interrupted.

mod models;
mod whisper;

pub use models::{format_timestamp, Transcript, TranscriptSegment};
pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file into ordered segments with timestamps.
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript>;
}
