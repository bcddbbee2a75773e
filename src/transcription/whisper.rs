//! OpenAI Whisper transcription implementation.

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::config::TranscriptionSettings;
use crate::error::{PinpointError, Result};
use crate::media::{extract_audio, split_audio};
use async_openai::config::OpenAIConfig;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    language: Option<String>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
    temp_dir: PathBuf,
}

impl WhisperTranscriber {
    /// Create a transcriber from settings, writing intermediate audio under `temp_dir`.
    pub fn with_config(
        client: async_openai::Client<OpenAIConfig>,
        settings: &TranscriptionSettings,
        temp_dir: &Path,
    ) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            language: settings.language.clone(),
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
            temp_dir: temp_dir.to_path_buf(),
        }
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(&self, audio_path: &Path) -> Result<Vec<TranscriptSegment>> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| PinpointError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| PinpointError::OpenAI(format!("Whisper API error: {}", e)))?;

        let segments: Vec<TranscriptSegment> = response
            .segments
            .map(|segs| {
                segs.iter()
                    .map(|s| TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim()))
                    .collect()
            })
            .unwrap_or_else(|| {
                // No segment breakdown: keep the whole text as one segment.
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration as f64,
                    response.text.trim(),
                )]
            });

        debug!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self), fields(media_path = %media_path.display()))]
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript> {
        let video_id = media_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let work_dir = tempfile::tempdir_in(&self.temp_dir)?;

        let audio_path = work_dir.path().join("audio.mp3");
        extract_audio(media_path, &audio_path).await?;

        let chunks = split_audio(&audio_path, work_dir.path(), self.chunk_duration_seconds).await?;
        let chunk_count = chunks.len();
        info!("Transcribing {} audio chunk(s) with {}", chunk_count, self.model);

        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>)> = Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, (chunk_path, time_offset))| async move {
                let result = self.transcribe_single(&chunk_path).await;
                (idx, time_offset, result)
            })
            .buffer_unordered(self.max_concurrent_chunks);

        // Fail fast: one failed chunk fails the whole transcript.
        while let Some((idx, time_offset, result)) = stream.next().await {
            match result {
                Ok(segments) => results.push((idx, time_offset, segments)),
                Err(e) => {
                    return Err(PinpointError::Transcription(format!(
                        "Chunk {} at {:.0}s failed: {}",
                        idx, time_offset, e
                    )));
                }
            }
        }

        results.sort_by_key(|(idx, _, _)| *idx);

        let mut all_segments = Vec::new();
        for (_, time_offset, mut segments) in results {
            for segment in &mut segments {
                segment.start_seconds += time_offset;
                segment.end_seconds += time_offset;
            }
            all_segments.extend(segments.into_iter().filter(|s| !s.text.is_empty()));
        }

        Ok(Transcript::new(video_id, all_segments))
    }
}
