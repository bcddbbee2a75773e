//! Uploaded media: per-tenant storage, ffmpeg helpers, and preview thumbnails.

mod ffmpeg;
mod library;
mod preview;

pub use ffmpeg::{extract_audio, extract_thumbnail, probe_duration, split_audio};
pub use library::{validate_display_name, MediaLibrary, SUPPORTED_EXTENSIONS};
pub use preview::{FfmpegPreview, PreviewGenerator};
