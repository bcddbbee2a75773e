//! Grounded question answering over retrieved candidates.
//!
//! The answer generator turns the reranked pool into a prompt and walks a
//! fallback chain (primary model, secondary model, local extract) so a
//! question always gets a usable response.

mod answer;
mod chat;
pub mod pipeline;

pub use answer::AnswerGenerator;
pub use chat::{ChatModel, OpenAIChat};
pub use pipeline::QueryPipeline;

use crate::retrieval::Candidate;
use serde::Serialize;

/// Which link of the fallback chain produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStrategy {
    Primary,
    Secondary,
    LocalFallback,
}

/// A timestamp the user can jump to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub video_id: String,
    pub start_time: f64,
    pub end_time: f64,
    /// `MM:SS` or `HH:MM:SS`.
    pub timestamp: String,
}

impl From<&Candidate> for Citation {
    fn from(candidate: &Candidate) -> Self {
        Self {
            video_id: candidate.video_id.clone(),
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            timestamp: candidate.timestamp(),
        }
    }
}

/// A generated answer with its sources. The first citation is the top candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub strategy: AnswerStrategy,
    /// Remote model that wrote the text, if any.
    pub model: Option<String>,
    /// Informational message for the user (e.g. why no model was used).
    pub notice: Option<String>,
    pub citations: Vec<Citation>,
}

impl Answer {
    /// Format the answer for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.text.clone();

        if !self.citations.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for citation in &self.citations {
                output.push_str(&format!("\n{} @ {}", citation.video_id, citation.timestamp));
            }
        }

        output
    }
}

/// Format candidates as numbered excerpts for a prompt.
pub fn format_context_for_prompt(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "---\n[{}] {} @ {}\n{}\n---",
                i + 1,
                c.video_id,
                c.timestamp(),
                c.expanded_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(video: &str, start: f64, text: &str) -> Candidate {
        Candidate {
            video_id: video.to_string(),
            group_index: 0,
            raw_text: text.to_string(),
            expanded_text: text.to_string(),
            start_time: start,
            end_time: start + 10.0,
            distance: 0.1,
            rerank_score: None,
        }
    }

    #[test]
    fn test_format_context() {
        let context = format_context_for_prompt(&[
            candidate("Lecture1", 95.0, "first"),
            candidate("Lecture2", 3.0, "second"),
        ]);
        assert!(context.starts_with("---\n[1] Lecture1 @ 01:35\nfirst"));
        assert!(context.contains("[2] Lecture2 @ 00:03\nsecond"));
    }

    #[test]
    fn test_display_lists_sources() {
        let answer = Answer {
            text: "Cells divide.".to_string(),
            strategy: AnswerStrategy::Primary,
            model: Some("m".to_string()),
            notice: None,
            citations: vec![Citation::from(&candidate("Bio", 61.0, "x"))],
        };
        assert_eq!(
            answer.format_for_display(),
            "Cells divide.\n\n--- Sources ---\n\nBio @ 01:01"
        );
    }
}
