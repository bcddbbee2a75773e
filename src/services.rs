//! Shared, lazily constructed services.
//!
//! The transcriber, embedder, reranker and chat model are expensive to build
//! and safe to share. Each lives in a `tokio::sync::OnceCell`, so concurrent
//! first callers wait for a single construction instead of racing.

use crate::config::{EmbeddingProvider, Prompts, RerankProvider, Settings, StoreProvider};
use crate::embedding::{Embedder, HashEmbedder, OpenAIEmbedder};
use crate::error::{PinpointError, Result};
use crate::jobs::{JobStore, MemoryJobStore, SqliteJobStore};
use crate::media::{FfmpegPreview, MediaLibrary, PreviewGenerator};
use crate::openai::create_client_with;
use crate::rag::{ChatModel, OpenAIChat};
use crate::rerank::{LexicalReranker, RemoteReranker, Reranker};
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::vector_store::TenantStores;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Process-wide services shared by ingestion workers and queries.
pub struct Services {
    settings: Settings,
    prompts: Prompts,
    jobs: Arc<dyn JobStore>,
    media: MediaLibrary,
    previews: Arc<dyn PreviewGenerator>,
    transcriber: OnceCell<Arc<dyn Transcriber>>,
    embedder: OnceCell<Arc<dyn Embedder>>,
    stores: OnceCell<Arc<TenantStores>>,
    reranker: OnceCell<Arc<dyn Reranker>>,
    chat: OnceCell<Option<Arc<dyn ChatModel>>>,
}

impl Services {
    /// Build services from settings. Remote clients are created on first use.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let jobs: Arc<dyn JobStore> = match settings.jobs.provider {
            StoreProvider::Sqlite => Arc::new(SqliteJobStore::new(&settings.jobs_db_path())?),
            StoreProvider::Memory => Arc::new(MemoryJobStore::new()),
        };

        let media = MediaLibrary::new(settings.tenants_dir());

        Ok(Self {
            settings,
            prompts,
            jobs,
            media,
            previews: Arc::new(FfmpegPreview::default()),
            transcriber: OnceCell::new(),
            embedder: OnceCell::new(),
            stores: OnceCell::new(),
            reranker: OnceCell::new(),
            chat: OnceCell::new(),
        })
    }

    /// Use a specific transcriber instead of Whisper.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = OnceCell::new_with(Some(transcriber));
        self
    }

    /// Use a specific embedder instead of the configured provider.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = OnceCell::new_with(Some(embedder));
        self.stores = OnceCell::new();
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = OnceCell::new_with(Some(reranker));
        self
    }

    /// Use a specific chat model. `None` behaves like a missing credential.
    pub fn with_chat_model(mut self, chat: Option<Arc<dyn ChatModel>>) -> Self {
        self.chat = OnceCell::new_with(Some(chat));
        self
    }

    pub fn with_previews(mut self, previews: Arc<dyn PreviewGenerator>) -> Self {
        self.previews = previews;
        self
    }

    pub fn with_job_store(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn jobs(&self) -> Arc<dyn JobStore> {
        self.jobs.clone()
    }

    pub fn media(&self) -> &MediaLibrary {
        &self.media
    }

    pub fn previews(&self) -> Arc<dyn PreviewGenerator> {
        self.previews.clone()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.general.request_timeout_secs)
    }

    pub async fn transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        self.transcriber
            .get_or_try_init(|| self.build_transcriber())
            .await
            .cloned()
    }

    pub async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        self.embedder
            .get_or_try_init(|| self.build_embedder())
            .await
            .cloned()
    }

    /// Per-tenant vector stores, sharing one embedder.
    pub async fn stores(&self) -> Result<Arc<TenantStores>> {
        self.stores
            .get_or_try_init(|| async {
                let embedder = self.embedder().await?;
                Ok::<_, PinpointError>(Arc::new(TenantStores::new(
                    self.settings.vector_store.provider,
                    self.settings.tenants_dir(),
                    embedder,
                )))
            })
            .await
            .cloned()
    }

    pub async fn reranker(&self) -> Result<Arc<dyn Reranker>> {
        self.reranker
            .get_or_try_init(|| self.build_reranker())
            .await
            .cloned()
    }

    /// The chat model, or `None` when no credential is configured.
    pub async fn chat_model(&self) -> Result<Option<Arc<dyn ChatModel>>> {
        self.chat
            .get_or_try_init(|| self.build_chat_model())
            .await
            .cloned()
    }

    async fn build_transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        let client = create_client_with(None, self.timeout())?;
        info!("Using Whisper transcription ({})", self.settings.transcription.model);
        Ok(Arc::new(WhisperTranscriber::with_config(
            client,
            &self.settings.transcription,
            &self.settings.temp_dir(),
        )))
    }

    async fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let settings = &self.settings.embedding;
        match settings.provider {
            EmbeddingProvider::OpenAI => {
                let client = create_client_with(None, self.timeout())?;
                info!("Using OpenAI embeddings ({})", settings.model);
                Ok(Arc::new(OpenAIEmbedder::with_config(
                    client,
                    &settings.model,
                    settings.dimensions as usize,
                )))
            }
            EmbeddingProvider::Hash => {
                info!("Using local hash embeddings ({} dims)", settings.dimensions);
                Ok(Arc::new(HashEmbedder::new(settings.dimensions as usize)))
            }
        }
    }

    async fn build_reranker(&self) -> Result<Arc<dyn Reranker>> {
        match self.settings.rerank.provider {
            RerankProvider::Lexical => Ok(Arc::new(LexicalReranker::new())),
            RerankProvider::Remote => {
                info!("Using remote reranker at {}", self.settings.rerank.endpoint);
                Ok(Arc::new(RemoteReranker::from_settings(
                    &self.settings.rerank,
                    self.timeout(),
                )?))
            }
        }
    }

    async fn build_chat_model(&self) -> Result<Option<Arc<dyn ChatModel>>> {
        let Some(key) = self.settings.answer.api_key() else {
            info!(
                "{} is not set; answers will use the local fallback",
                self.settings.answer.api_key_env
            );
            return Ok(None);
        };
        let client = create_client_with(Some(&key), self.timeout())?;
        Ok(Some(Arc::new(OpenAIChat::new(
            client,
            self.settings.answer.temperature,
        ))))
    }
}
