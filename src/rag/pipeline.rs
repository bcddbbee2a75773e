//! Query pipeline: federated retrieval → rerank → answer.

use super::{Answer, AnswerGenerator};
use crate::error::Result;
use crate::rerank::{rerank_candidates, Reranker};
use crate::retrieval::{Candidate, FederatedRetriever};
use crate::services::Services;
use crate::tenant::TenantId;
use std::sync::Arc;
use tracing::{info, instrument};

/// Answers questions against a tenant's whole video library.
pub struct QueryPipeline {
    retriever: FederatedRetriever,
    reranker: Arc<dyn Reranker>,
    generator: AnswerGenerator,
    top_n: usize,
}

impl QueryPipeline {
    pub fn new(
        retriever: FederatedRetriever,
        reranker: Arc<dyn Reranker>,
        generator: AnswerGenerator,
        top_n: usize,
    ) -> Self {
        Self {
            retriever,
            reranker,
            generator,
            top_n,
        }
    }

    /// Assemble a pipeline from shared services.
    pub async fn from_services(services: &Services) -> Result<Self> {
        let settings = services.settings();
        let retriever = FederatedRetriever::new(services.stores().await?, settings.retrieval.clone());
        let generator = AnswerGenerator::new(
            services.chat_model().await?,
            &settings.answer,
            services.prompts().clone(),
        );
        Ok(Self::new(
            retriever,
            services.reranker().await?,
            generator,
            settings.retrieval.final_top_k,
        ))
    }

    /// The best passages for `question`, reranked and truncated.
    #[instrument(skip(self, question), fields(tenant = %tenant))]
    pub async fn search(&self, tenant: &TenantId, question: &str) -> Result<Vec<Candidate>> {
        let pool = self.retriever.query(tenant, question).await?;
        Ok(rerank_candidates(self.reranker.as_ref(), question, pool, self.top_n).await)
    }

    /// Answer `question` from the tenant's library.
    #[instrument(skip(self, question), fields(tenant = %tenant))]
    pub async fn ask(&self, tenant: &TenantId, question: &str) -> Result<Answer> {
        let candidates = self.search(tenant, question).await?;
        let answer = self.generator.answer(question, &candidates).await;
        info!(
            "Answered with {:?} from {} passages",
            answer.strategy,
            candidates.len()
        );
        Ok(answer)
    }

    /// Search within one video by raw distance.
    pub async fn search_video(
        &self,
        tenant: &TenantId,
        display_name: &str,
        question: &str,
        k: usize,
    ) -> Result<Vec<Candidate>> {
        self.retriever.search_video(tenant, display_name, question, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SegmentGroup;
    use crate::config::{EmbeddingProvider, Settings, StoreProvider};
    use crate::embedding::HashEmbedder;
    use crate::error::PinpointError;
    use crate::rag::{AnswerStrategy, ChatModel};
    use crate::vector_store::naming::collection_name;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, model: &str, _system: &str, _user: &str) -> Result<String> {
            Ok(format!("answered by {}", model))
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.general.data_dir = "/nonexistent/pinpoint".to_string();
        settings.jobs.provider = StoreProvider::Memory;
        settings.vector_store.provider = StoreProvider::Memory;
        settings.embedding.provider = EmbeddingProvider::Hash;
        settings
    }

    fn group(video: &str, index: u32, text: &str) -> SegmentGroup {
        SegmentGroup {
            video_id: video.to_string(),
            group_index: index,
            start_time: index as f64 * 30.0,
            end_time: index as f64 * 30.0 + 29.0,
            text: text.to_string(),
        }
    }

    async fn seeded(chat: Option<Arc<dyn ChatModel>>) -> (Services, TenantId) {
        let services = Services::new(settings())
            .unwrap()
            .with_embedder(Arc::new(HashEmbedder::new(128)))
            .with_chat_model(chat);
        let tenant = TenantId::new("alice").unwrap();
        let store = services.stores().await.unwrap().for_tenant(&tenant).unwrap();

        for (video, texts) in [
            ("Biology.mp4", ["cells divide by mitosis", "mitochondria produce energy", "ribosomes build proteins"]),
            ("History.mp4", ["rome was founded", "the empire expanded", "the republic fell"]),
        ] {
            let collection = collection_name(video);
            store.create_collection(&collection, video).await.unwrap();
            let groups: Vec<_> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| group(video, i as u32, t))
                .collect();
            store.add(&collection, &groups).await.unwrap();
        }
        (services, tenant)
    }

    #[tokio::test]
    async fn test_search_reranks_and_truncates() {
        let (services, tenant) = seeded(None).await;
        let pipeline = QueryPipeline::from_services(&services).await.unwrap();

        let results = pipeline.search(&tenant, "mitochondria energy").await.unwrap();
        assert!(results.len() <= services.settings().retrieval.final_top_k);
        assert_eq!(results[0].video_id, "Biology.mp4");
        assert!(results[0].expanded_text.contains("mitochondria produce energy"));
        assert!(results.iter().all(|c| c.rerank_score.is_some()));
    }

    #[tokio::test]
    async fn test_ask_without_credential_returns_passages() {
        let (services, tenant) = seeded(None).await;
        let pipeline = QueryPipeline::from_services(&services).await.unwrap();

        let answer = pipeline.ask(&tenant, "how is the republic").await.unwrap();
        assert_eq!(answer.strategy, AnswerStrategy::LocalFallback);
        assert!(answer.notice.is_some());
        assert!(!answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_ask_with_model() {
        let (services, tenant) = seeded(Some(Arc::new(Echo))).await;
        let pipeline = QueryPipeline::from_services(&services).await.unwrap();

        let answer = pipeline.ask(&tenant, "proteins").await.unwrap();
        assert_eq!(answer.strategy, AnswerStrategy::Primary);
        assert!(answer.text.starts_with("answered by"));
    }

    #[tokio::test]
    async fn test_empty_library() {
        let services = Services::new(settings())
            .unwrap()
            .with_embedder(Arc::new(HashEmbedder::new(16)))
            .with_chat_model(Some(Arc::new(Echo)));
        let pipeline = QueryPipeline::from_services(&services).await.unwrap();
        let tenant = TenantId::new("nobody").unwrap();

        let answer = pipeline.ask(&tenant, "anything").await.unwrap();
        assert_eq!(answer.strategy, AnswerStrategy::LocalFallback);
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_search_video_unknown() {
        let (services, tenant) = seeded(None).await;
        let pipeline = QueryPipeline::from_services(&services).await.unwrap();
        assert!(matches!(
            pipeline.search_video(&tenant, "Missing.mp4", "x", 3).await,
            Err(PinpointError::CollectionNotFound(_))
        ));
    }
}
