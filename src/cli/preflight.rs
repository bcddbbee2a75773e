//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{PinpointError, Result};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion needs ffmpeg and the transcription credential.
    Ingest,
    /// Queries need the embedding credential when embeddings are remote.
    Query,
}

/// Run pre-flight checks for the given operation.
///
/// A missing answer-model credential is not an error: answers fall back to
/// extracted passages.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_api_key()?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
            check_embedding_key(settings)?;
        }
        Operation::Query => {
            check_embedding_key(settings)?;
        }
    }
    Ok(())
}

fn check_embedding_key(settings: &Settings) -> Result<()> {
    match settings.embedding.provider {
        EmbeddingProvider::OpenAI => check_api_key(),
        EmbeddingProvider::Hash => Ok(()),
    }
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(PinpointError::CredentialMissing(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(PinpointError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PinpointError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(PinpointError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_with_local_embeddings_has_no_requirements() {
        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProvider::Hash;
        assert!(check(Operation::Query, &settings).is_ok());
    }
}
