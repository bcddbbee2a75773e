//! Federated retrieval across every video a tenant owns.
//!
//! Each collection contributes a few nearest neighbours to a shared pool.
//! Every hit is then widened with its neighbouring groups so the reranker
//! and the answer generator see more than a single window of speech.

use crate::config::{RetrievalSettings, MAX_EXPANSION_WINDOW};
use crate::error::Result;
use crate::tenant::TenantId;
use crate::transcription::format_timestamp;
use crate::vector_store::naming::{collection_name, display_name_from_collection};
use crate::vector_store::{QueryHit, TenantStores, VectorStore};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A retrieval result. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Display name of the source video.
    pub video_id: String,
    pub group_index: u32,
    /// Text of the matched group alone.
    pub raw_text: String,
    /// Matched group plus its neighbours, in index order.
    pub expanded_text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
    /// Relevance assigned by the reranker (higher is better).
    pub rerank_score: Option<f32>,
}

impl Candidate {
    fn from_hit(video_id: String, hit: QueryHit, expanded_text: String) -> Self {
        Self {
            video_id,
            group_index: hit.group.group_index,
            raw_text: hit.group.text,
            expanded_text,
            start_time: hit.group.start_time,
            end_time: hit.group.end_time,
            distance: hit.distance,
            rerank_score: None,
        }
    }

    /// Start timestamp formatted for citations.
    pub fn timestamp(&self) -> String {
        format_timestamp(self.start_time)
    }
}

/// Stable ascending sort by distance.
pub fn sort_by_distance(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Text of every existing group in `[group_index - window, group_index + window]`,
/// joined in ascending index order. `window` is capped at [`MAX_EXPANSION_WINDOW`].
pub async fn expand_context(
    store: &dyn VectorStore,
    collection: &str,
    group_index: u32,
    window: usize,
) -> Result<String> {
    let window = window.min(MAX_EXPANSION_WINDOW) as u32;
    let lo = group_index.saturating_sub(window);
    let hi = group_index.saturating_add(window);
    let indices: Vec<u32> = (lo..=hi).collect();

    let groups = store.get(collection, &indices).await?;
    Ok(groups
        .iter()
        .map(|g| g.text.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Fans queries out over a tenant's collections.
pub struct FederatedRetriever {
    stores: Arc<TenantStores>,
    settings: RetrievalSettings,
}

impl FederatedRetriever {
    pub fn new(stores: Arc<TenantStores>, settings: RetrievalSettings) -> Self {
        Self { stores, settings }
    }

    /// Candidate pool for `text` across all of the tenant's videos, by ascending distance.
    ///
    /// A collection that fails is logged and skipped. A tenant without any
    /// collections gets an empty pool.
    #[instrument(skip(self, text), fields(tenant = %tenant))]
    pub async fn query(&self, tenant: &TenantId, text: &str) -> Result<Vec<Candidate>> {
        let store = self.stores.for_tenant(tenant)?;
        self.gather(store.as_ref(), text).await
    }

    pub(crate) async fn gather(&self, store: &dyn VectorStore, text: &str) -> Result<Vec<Candidate>> {
        let collections = store.list_collections().await?;
        if collections.is_empty() {
            debug!("No collections to search");
            return Ok(Vec::new());
        }

        let results = join_all(
            collections
                .iter()
                .map(|collection| self.query_collection(store, collection, text)),
        )
        .await;

        let mut pool = Vec::new();
        for (collection, result) in collections.iter().zip(results) {
            match result {
                Ok(candidates) => pool.extend(candidates),
                Err(e) => warn!("Skipping collection {}: {}", collection, e),
            }
        }

        sort_by_distance(&mut pool);
        debug!(
            "Gathered {} candidates from {} collections",
            pool.len(),
            collections.len()
        );
        Ok(pool)
    }

    async fn query_collection(
        &self,
        store: &dyn VectorStore,
        collection: &str,
        text: &str,
    ) -> Result<Vec<Candidate>> {
        let hits = store
            .query(collection, text, self.settings.per_collection_k)
            .await?;
        self.expand_hits(store, collection, hits).await
    }

    async fn expand_hits(
        &self,
        store: &dyn VectorStore,
        collection: &str,
        hits: Vec<QueryHit>,
    ) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            let expanded = expand_context(
                store,
                collection,
                hit.group.group_index,
                self.settings.expansion_window,
            )
            .await?;
            // The collection name is authoritative; entry metadata may predate a rename.
            let video_id = display_name_from_collection(collection)
                .unwrap_or_else(|| hit.group.video_id.clone());
            candidates.push(Candidate::from_hit(video_id, hit, expanded));
        }
        Ok(candidates)
    }

    /// Search one video, ranked by raw distance. Hits farther than
    /// `max_distance` are dropped as irrelevant.
    #[instrument(skip(self, text), fields(tenant = %tenant))]
    pub async fn search_video(
        &self,
        tenant: &TenantId,
        display_name: &str,
        text: &str,
        k: usize,
    ) -> Result<Vec<Candidate>> {
        let store = self.stores.for_tenant(tenant)?;
        let collection = collection_name(display_name);

        let hits: Vec<QueryHit> = store
            .query(&collection, text, k)
            .await?
            .into_iter()
            .filter(|hit| hit.distance <= self.settings.max_distance)
            .collect();

        self.expand_hits(store.as_ref(), &collection, hits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{group_segments, SegmentGroup};
    use crate::config::StoreProvider;
    use crate::embedding::HashEmbedder;
    use crate::error::PinpointError;
    use crate::transcription::TranscriptSegment;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn retriever() -> FederatedRetriever {
        let stores = TenantStores::new(
            StoreProvider::Memory,
            PathBuf::from("unused"),
            Arc::new(HashEmbedder::new(256)),
        );
        FederatedRetriever::new(Arc::new(stores), RetrievalSettings::default())
    }

    async fn index(store: &dyn VectorStore, name: &str, texts: &[&str]) {
        let segments: Vec<TranscriptSegment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TranscriptSegment::new(i as f64 * 10.0, i as f64 * 10.0 + 9.0, *t))
            .collect();
        let collection = collection_name(name);
        store.create_collection(&collection, name).await.unwrap();
        store
            .add(&collection, &group_segments(name, &segments, 3))
            .await
            .unwrap();
    }

    fn lecture() -> Vec<&'static str> {
        vec![
            "welcome everyone",
            "today is the first lecture",
            "please sit down",
            "mitochondria produce energy",
            "mitochondria are the powerhouse",
            "of the cell",
            "homework is due friday",
            "read chapter two",
            "see you next time",
        ]
    }

    #[tokio::test]
    async fn test_middle_hit_expands_to_whole_lecture() {
        let retriever = retriever();
        let tenant = TenantId::new("alice").unwrap();
        let store = retriever.stores.for_tenant(&tenant).unwrap();
        index(store.as_ref(), "Lecture1", &lecture()).await;

        let pool = retriever
            .query(&tenant, "what do mitochondria produce")
            .await
            .unwrap();

        let top = &pool[0];
        assert_eq!(top.video_id, "Lecture1");
        assert_eq!(top.group_index, 1);
        assert_eq!(top.start_time, 30.0);
        assert_eq!(top.end_time, 59.0);
        assert_eq!(top.expanded_text, lecture().join(" "));
        assert_eq!(
            top.raw_text,
            "mitochondria produce energy mitochondria are the powerhouse of the cell"
        );
    }

    #[tokio::test]
    async fn test_expansion_clips_and_is_idempotent() {
        let store = MemoryVectorStore::new(Arc::new(HashEmbedder::new(64)));
        index(&store, "Lecture1", &lecture()).await;
        let collection = collection_name("Lecture1");

        let first = expand_context(&store, &collection, 0, 1).await.unwrap();
        assert_eq!(first, lecture()[..6].join(" "));

        let again = expand_context(&store, &collection, 0, 1).await.unwrap();
        assert_eq!(first, again);

        let last = expand_context(&store, &collection, 2, 5).await.unwrap();
        assert_eq!(last, lecture().join(" "));

        // Huge windows are capped rather than enumerating every index.
        let capped = expand_context(&store, &collection, 1, usize::MAX).await.unwrap();
        assert_eq!(capped, lecture().join(" "));
    }

    #[tokio::test]
    async fn test_pool_spans_videos() {
        let retriever = retriever();
        let tenant = TenantId::new("alice").unwrap();
        let store = retriever.stores.for_tenant(&tenant).unwrap();
        index(store.as_ref(), "A", &["volcanoes erupt lava"]).await;
        index(store.as_ref(), "B", &["lava cools into basalt"]).await;

        let pool = retriever.query(&tenant, "lava").await.unwrap();
        assert_eq!(pool.len(), 2);
        let mut videos: Vec<&str> = pool.iter().map(|c| c.video_id.as_str()).collect();
        videos.sort();
        assert_eq!(videos, vec!["A", "B"]);
        assert!(pool[0].distance <= pool[1].distance);
    }

    #[tokio::test]
    async fn test_tenant_without_collections() {
        let retriever = retriever();
        let tenant = TenantId::new("nobody").unwrap();
        assert!(retriever.query(&tenant, "anything").await.unwrap().is_empty());
    }

    struct FlakyStore {
        inner: MemoryVectorStore,
        broken: String,
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        async fn create_collection(&self, c: &str, d: &str) -> Result<()> {
            self.inner.create_collection(c, d).await
        }
        async fn delete_collection(&self, c: &str) -> Result<bool> {
            self.inner.delete_collection(c).await
        }
        async fn rename_collection(&self, f: &str, t: &str, d: &str) -> Result<()> {
            self.inner.rename_collection(f, t, d).await
        }
        async fn list_collections(&self) -> Result<Vec<String>> {
            self.inner.list_collections().await
        }
        async fn has_collection(&self, c: &str) -> Result<bool> {
            self.inner.has_collection(c).await
        }
        async fn add(&self, c: &str, g: &[SegmentGroup]) -> Result<usize> {
            self.inner.add(c, g).await
        }
        async fn query(&self, c: &str, t: &str, k: usize) -> Result<Vec<QueryHit>> {
            if c == self.broken {
                return Err(PinpointError::CollectionNotFound(c.to_string()));
            }
            self.inner.query(c, t, k).await
        }
        async fn get(&self, c: &str, i: &[u32]) -> Result<Vec<SegmentGroup>> {
            self.inner.get(c, i).await
        }
        async fn count(&self, c: &str) -> Result<usize> {
            self.inner.count(c).await
        }
    }

    #[tokio::test]
    async fn test_failing_collection_is_skipped() {
        let store = FlakyStore {
            inner: MemoryVectorStore::new(Arc::new(HashEmbedder::new(64))),
            broken: collection_name("B"),
        };
        index(&store, "A", &["tides follow the moon"]).await;
        index(&store, "B", &["tides and the moon"]).await;

        let pool = retriever().gather(&store, "moon tides").await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].video_id, "A");
    }

    #[tokio::test]
    async fn test_search_video_threshold() {
        let stores = TenantStores::new(
            StoreProvider::Memory,
            PathBuf::from("unused"),
            Arc::new(HashEmbedder::new(256)),
        );
        let settings = RetrievalSettings {
            max_distance: 0.9,
            ..RetrievalSettings::default()
        };
        let retriever = FederatedRetriever::new(Arc::new(stores), settings);
        let tenant = TenantId::new("alice").unwrap();
        let store = retriever.stores.for_tenant(&tenant).unwrap();
        index(
            store.as_ref(),
            "talk.mp4",
            &["quantum", "entanglement", "explained", "unrelated", "cooking", "pasta"],
        )
        .await;

        let hits = retriever
            .search_video(&tenant, "talk.mp4", "quantum entanglement", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].group_index, 0);

        assert!(matches!(
            retriever.search_video(&tenant, "missing.mp4", "x", 5).await,
            Err(PinpointError::CollectionNotFound(_))
        ));
    }
}
