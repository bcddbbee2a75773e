//! Configuration module for Pinpoint.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts, GENERAL_KNOWLEDGE_PREFIX};
pub use settings::{
    AnswerSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, IngestSettings,
    JobStoreSettings, PromptSettings, RerankProvider, RerankSettings, RetrievalSettings, Settings,
    StoreProvider, TranscriptionSettings, VectorStoreSettings, MAX_EXPANSION_WINDOW,
};
