//! Vector store abstraction for Pinpoint.
//!
//! Every tenant owns an isolated store; inside it every video has its own
//! named collection of embedded segment groups.

mod memory;
pub mod naming;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::SegmentGroup;
use crate::config::StoreProvider;
use crate::embedding::Embedder;
use crate::error::{PinpointError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A nearest-neighbour hit.
#[derive(Debug, Clone)]
pub struct QueryHit {
    /// The matched group.
    pub group: SegmentGroup,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Trait for per-tenant vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection. Fails if it already exists.
    async fn create_collection(&self, collection: &str, display_name: &str) -> Result<()>;

    /// Delete a collection and its entries. Returns whether it existed.
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    /// Move a collection to a new name, keeping its entries.
    async fn rename_collection(&self, from: &str, to: &str, display_name: &str) -> Result<()>;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Check if a collection exists.
    async fn has_collection(&self, collection: &str) -> Result<bool>;

    /// Embed and store a batch of groups.
    async fn add(&self, collection: &str, groups: &[SegmentGroup]) -> Result<usize>;

    /// Up to `k` nearest groups to `text`, by ascending distance.
    async fn query(&self, collection: &str, text: &str, k: usize) -> Result<Vec<QueryHit>>;

    /// Exact fetch by group index. Missing indices are skipped; output is ascending.
    async fn get(&self, collection: &str, group_indices: &[u32]) -> Result<Vec<SegmentGroup>>;

    /// Number of groups in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`; lower is more similar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank scored groups by ascending distance, keeping insertion order on ties.
pub(crate) fn nearest(mut hits: Vec<QueryHit>, k: usize) -> Vec<QueryHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

/// An embedder must return exactly one vector per group.
pub(crate) fn check_embedding_count(groups: usize, embeddings: usize) -> Result<()> {
    if groups != embeddings {
        return Err(PinpointError::Embedding(format!(
            "expected {} embeddings, got {}",
            groups, embeddings
        )));
    }
    Ok(())
}

/// Resolves tenants to their vector stores, opening each at most once.
pub struct TenantStores {
    provider: StoreProvider,
    tenants_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    stores: Mutex<HashMap<TenantId, Arc<dyn VectorStore>>>,
}

impl TenantStores {
    pub fn new(provider: StoreProvider, tenants_dir: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            provider,
            tenants_dir,
            embedder,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// The store for `tenant`, opening it on first use.
    pub fn for_tenant(&self, tenant: &TenantId) -> Result<Arc<dyn VectorStore>> {
        let mut stores = self.stores.lock().map_err(|e| {
            PinpointError::VectorStore(format!("Failed to acquire lock: {}", e))
        })?;

        if let Some(store) = stores.get(tenant) {
            return Ok(store.clone());
        }

        let store: Arc<dyn VectorStore> = match self.provider {
            StoreProvider::Memory => Arc::new(MemoryVectorStore::new(self.embedder.clone())),
            StoreProvider::Sqlite => {
                let path = self
                    .tenants_dir
                    .join(naming::tenant_dir_name(tenant.as_str()))
                    .join("vectors.db");
                Arc::new(SqliteVectorStore::new(&path, self.embedder.clone())?)
            }
        };

        debug!("Opened {} vector store for tenant {}", self.provider, tenant);
        stores.insert(tenant.clone(), store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    /// Drops the last vector of every batch.
    struct ShortEmbedder(HashEmbedder);

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut vectors = self.0.embed_batch(texts).await?;
            vectors.pop();
            Ok(vectors)
        }
        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }
    }

    #[tokio::test]
    async fn test_short_embedding_batch_is_rejected() {
        let embedder: Arc<dyn Embedder> = Arc::new(ShortEmbedder(HashEmbedder::new(16)));
        let stores: Vec<Arc<dyn VectorStore>> = vec![
            Arc::new(MemoryVectorStore::new(embedder.clone())),
            Arc::new(SqliteVectorStore::in_memory(embedder).unwrap()),
        ];
        let groups: Vec<SegmentGroup> = (0..3)
            .map(|i| SegmentGroup {
                video_id: "v".to_string(),
                group_index: i,
                start_time: 0.0,
                end_time: 1.0,
                text: format!("group {}", i),
            })
            .collect();

        for store in stores {
            store.create_collection("c", "v").await.unwrap();
            assert!(matches!(
                store.add("c", &groups).await,
                Err(PinpointError::Embedding(_))
            ));
            assert_eq!(store.count("c").await.unwrap(), 0);
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
        assert!((cosine_distance(&a, &d) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_nearest_is_stable_on_ties() {
        let hit = |i: u32, d: f32| QueryHit {
            group: SegmentGroup {
                video_id: "v".to_string(),
                group_index: i,
                start_time: 0.0,
                end_time: 0.0,
                text: String::new(),
            },
            distance: d,
        };
        let ranked = nearest(vec![hit(0, 0.5), hit(1, 0.1), hit(2, 0.5), hit(3, 0.9)], 3);
        let order: Vec<u32> = ranked.iter().map(|h| h.group.group_index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_tenant_stores_cache_per_tenant() {
        let stores = TenantStores::new(
            StoreProvider::Memory,
            PathBuf::from("unused"),
            Arc::new(HashEmbedder::new(16)),
        );
        let alice = TenantId::new("alice").unwrap();
        let bob = TenantId::new("bob").unwrap();

        let a1 = stores.for_tenant(&alice).unwrap();
        let a2 = stores.for_tenant(&alice).unwrap();
        let b = stores.for_tenant(&bob).unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }
}
