//! In-memory vector store implementation.
//!
//! Useful for testing and single-process deployments without persistence.

use super::{check_embedding_count, cosine_distance, nearest, QueryHit, VectorStore};
use crate::chunking::SegmentGroup;
use crate::embedding::Embedder;
use crate::error::{PinpointError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct MemoryCollection {
    entries: BTreeMap<u32, (SegmentGroup, Vec<f32>)>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .read()
            .map_err(|e| PinpointError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .write()
            .map_err(|e| PinpointError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, collection: &str, _display_name: &str) -> Result<()> {
        let mut collections = self.write()?;
        if collections.contains_key(collection) {
            return Err(PinpointError::VectorStore(format!(
                "Collection already exists: {}",
                collection
            )));
        }
        collections.insert(
            collection.to_string(),
            MemoryCollection {
                entries: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.write()?.remove(collection).is_some())
    }

    async fn rename_collection(&self, from: &str, to: &str, display_name: &str) -> Result<()> {
        let mut collections = self.write()?;
        if collections.contains_key(to) {
            return Err(PinpointError::VectorStore(format!(
                "Collection already exists: {}",
                to
            )));
        }
        let mut existing = collections
            .remove(from)
            .ok_or_else(|| PinpointError::CollectionNotFound(from.to_string()))?;
        for (group, _) in existing.entries.values_mut() {
            group.video_id = display_name.to_string();
        }
        collections.insert(to.to_string(), existing);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(collection))
    }

    async fn add(&self, collection: &str, groups: &[SegmentGroup]) -> Result<usize> {
        if !self.has_collection(collection).await? {
            return Err(PinpointError::CollectionNotFound(collection.to_string()));
        }

        let texts: Vec<String> = groups.iter().map(|g| g.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        check_embedding_count(groups.len(), embeddings.len())?;

        let mut collections = self.write()?;
        // The collection may have been deleted while embedding.
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| PinpointError::CollectionNotFound(collection.to_string()))?;

        for (group, embedding) in groups.iter().zip(embeddings) {
            target
                .entries
                .insert(group.group_index, (group.clone(), embedding));
        }
        Ok(groups.len())
    }

    async fn query(&self, collection: &str, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        if !self.has_collection(collection).await? {
            return Err(PinpointError::CollectionNotFound(collection.to_string()));
        }

        let query_embedding = self.embedder.embed(text).await?;

        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| PinpointError::CollectionNotFound(collection.to_string()))?;

        let hits = target
            .entries
            .values()
            .map(|(group, embedding)| QueryHit {
                group: group.clone(),
                distance: cosine_distance(&query_embedding, embedding),
            })
            .collect();

        Ok(nearest(hits, k))
    }

    async fn get(&self, collection: &str, group_indices: &[u32]) -> Result<Vec<SegmentGroup>> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| PinpointError::CollectionNotFound(collection.to_string()))?;

        let mut indices = group_indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        Ok(indices
            .into_iter()
            .filter_map(|i| target.entries.get(&i).map(|(g, _)| g.clone()))
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read()?;
        collections
            .get(collection)
            .map(|c| c.entries.len())
            .ok_or_else(|| PinpointError::CollectionNotFound(collection.to_string()))
    }
}
