//! Hosted chat model access.

use crate::error::{PinpointError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A text-in, text-out language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a single system + user exchange with `model`.
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String>;
}

/// Chat completions through the OpenAI API.
pub struct OpenAIChat {
    client: async_openai::Client<OpenAIConfig>,
    temperature: f32,
}

impl OpenAIChat {
    pub fn new(client: async_openai::Client<OpenAIConfig>, temperature: f32) -> Self {
        Self { client, temperature }
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    #[instrument(skip(self, system, user))]
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PinpointError::RemoteModel(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PinpointError::RemoteModel(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| PinpointError::RemoteModel(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PinpointError::RemoteModel(format!("{}: {}", model, e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PinpointError::RemoteModel(format!("{}: empty response", model)))?
            .clone();

        debug!("Received {} chars from {}", answer.len(), model);
        Ok(answer)
    }
}
