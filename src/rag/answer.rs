//! Answer generation with a primary → secondary → local fallback chain.

use super::{format_context_for_prompt, Answer, AnswerStrategy, ChatModel, Citation};
use crate::config::{AnswerSettings, Prompts};
use crate::retrieval::Candidate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const NO_PASSAGES: &str =
    "I couldn't find any relevant passages in your video library for this question.";

/// Builds grounded answers from reranked candidates.
pub struct AnswerGenerator {
    /// `None` when no credential is configured.
    chat: Option<Arc<dyn ChatModel>>,
    primary_model: String,
    secondary_model: Option<String>,
    api_key_env: String,
    prompts: Prompts,
}

impl AnswerGenerator {
    pub fn new(chat: Option<Arc<dyn ChatModel>>, settings: &AnswerSettings, prompts: Prompts) -> Self {
        Self {
            chat,
            primary_model: settings.primary_model.clone(),
            secondary_model: settings.secondary_model.clone(),
            api_key_env: settings.api_key_env.clone(),
            prompts,
        }
    }

    /// Answer `question` from `candidates` (best first). Never fails.
    #[instrument(skip(self, question, candidates), fields(candidates = candidates.len()))]
    pub async fn answer(&self, question: &str, candidates: &[Candidate]) -> Answer {
        let citations: Vec<Citation> = candidates.iter().map(Citation::from).collect();

        if candidates.is_empty() {
            return Answer {
                text: NO_PASSAGES.to_string(),
                strategy: AnswerStrategy::LocalFallback,
                model: None,
                notice: None,
                citations,
            };
        }

        let Some(chat) = &self.chat else {
            info!("No credential configured, answering locally");
            return Answer {
                text: local_fallback(candidates),
                strategy: AnswerStrategy::LocalFallback,
                model: None,
                notice: Some(format!(
                    "No API key configured ({}); showing the most relevant passages instead.",
                    self.api_key_env
                )),
                citations,
            };
        };

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(candidates));
        let system = self.prompts.render_with_custom(&self.prompts.answer.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.answer.user, &vars);

        let chain = std::iter::once((AnswerStrategy::Primary, &self.primary_model)).chain(
            self.secondary_model
                .iter()
                .map(|m| (AnswerStrategy::Secondary, m)),
        );

        for (strategy, model) in chain {
            match chat.complete(model, &system, &user).await {
                Ok(text) => {
                    return Answer {
                        text,
                        strategy,
                        model: Some(model.clone()),
                        notice: None,
                        citations,
                    };
                }
                Err(e) => warn!("Model {} failed: {}", model, e),
            }
        }

        Answer {
            text: local_fallback(candidates),
            strategy: AnswerStrategy::LocalFallback,
            model: None,
            notice: Some(
                "The language model could not be reached; showing the most relevant passages instead."
                    .to_string(),
            ),
            citations,
        }
    }
}

/// Every candidate's expanded text, verbatim, with its source.
fn local_fallback(candidates: &[Candidate]) -> String {
    let mut out = String::from("Here are the most relevant passages from your videos:\n");
    for (i, c) in candidates.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} @ {}\n{}\n",
            i + 1,
            c.video_id,
            c.timestamp(),
            c.expanded_text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PinpointError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn candidate(video: &str, start: f64, text: &str) -> Candidate {
        Candidate {
            video_id: video.to_string(),
            group_index: 0,
            raw_text: text.to_string(),
            expanded_text: text.to_string(),
            start_time: start,
            end_time: start + 10.0,
            distance: 0.2,
            rerank_score: Some(1.0),
        }
    }

    /// Replies per model name; records every call.
    struct Scripted {
        replies: HashMap<String, Result<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<(&str, Result<String>)>) -> Arc<Self> {
            Arc::new(Self {
                replies: replies
                    .into_iter()
                    .map(|(m, r)| (m.to_string(), r))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, model: &str, _system: &str, user: &str) -> Result<String> {
            self.calls.lock().unwrap().push(model.to_string());
            assert!(user.contains("Question: "));
            match self.replies.get(model) {
                Some(Ok(text)) => Ok(text.clone()),
                _ => Err(PinpointError::RemoteModel(format!("{} down", model))),
            }
        }
    }

    fn settings() -> AnswerSettings {
        AnswerSettings {
            primary_model: "big".to_string(),
            secondary_model: Some("small".to_string()),
            ..AnswerSettings::default()
        }
    }

    fn pool() -> Vec<Candidate> {
        vec![
            candidate("Lecture1", 30.0, "mitochondria produce energy"),
            candidate("Lecture2", 125.0, "ATP is the energy currency"),
        ]
    }

    #[tokio::test]
    async fn test_primary_answers() {
        let chat = Scripted::new(vec![("big", Ok("From the lecture [Lecture1 @ 00:30].".to_string()))]);
        let generator = AnswerGenerator::new(Some(chat.clone()), &settings(), Prompts::default());

        let answer = generator.answer("what makes energy?", &pool()).await;
        assert_eq!(answer.strategy, AnswerStrategy::Primary);
        assert_eq!(answer.model.as_deref(), Some("big"));
        assert_eq!(answer.citations[0].video_id, "Lecture1");
        assert_eq!(answer.citations[0].timestamp, "00:30");
        assert_eq!(chat.calls(), vec!["big"]);
    }

    #[tokio::test]
    async fn test_secondary_after_primary_failure() {
        let chat = Scripted::new(vec![("small", Ok("fallback answer".to_string()))]);
        let generator = AnswerGenerator::new(Some(chat.clone()), &settings(), Prompts::default());

        let answer = generator.answer("q", &pool()).await;
        assert_eq!(answer.strategy, AnswerStrategy::Secondary);
        assert_eq!(answer.text, "fallback answer");
        assert_eq!(chat.calls(), vec!["big", "small"]);
    }

    #[tokio::test]
    async fn test_local_fallback_when_all_models_fail() {
        let chat = Scripted::new(vec![]);
        let generator = AnswerGenerator::new(Some(chat.clone()), &settings(), Prompts::default());

        let answer = generator.answer("q", &pool()).await;
        assert_eq!(answer.strategy, AnswerStrategy::LocalFallback);
        assert!(answer.notice.is_some());
        assert!(answer.text.contains("mitochondria produce energy"));
        assert!(answer.text.contains("Lecture2 @ 02:05"));
        assert_eq!(chat.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_never_calls_remote() {
        let generator = AnswerGenerator::new(None, &settings(), Prompts::default());

        let candidates = pool();
        let answer = generator.answer("q", &candidates).await;
        assert_eq!(answer.strategy, AnswerStrategy::LocalFallback);
        assert!(answer.notice.as_deref().unwrap_or("").contains("OPENAI_API_KEY"));
        for c in &candidates {
            assert!(answer.text.contains(&c.expanded_text));
        }
    }

    #[tokio::test]
    async fn test_no_candidates_skips_models() {
        let chat = Scripted::new(vec![("big", Ok("should not be used".to_string()))]);
        let generator = AnswerGenerator::new(Some(chat.clone()), &settings(), Prompts::default());

        let answer = generator.answer("q", &[]).await;
        assert_eq!(answer.text, NO_PASSAGES);
        assert!(answer.citations.is_empty());
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_secondary_configured() {
        let chat = Scripted::new(vec![]);
        let settings = AnswerSettings {
            secondary_model: None,
            ..settings()
        };
        let generator = AnswerGenerator::new(Some(chat.clone()), &settings, Prompts::default());

        let answer = generator.answer("q", &pool()).await;
        assert_eq!(answer.strategy, AnswerStrategy::LocalFallback);
        assert_eq!(chat.calls(), vec!["big"]);
    }
}
