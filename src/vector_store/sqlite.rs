//! SQLite-based vector store implementation.
//!
//! One database file per tenant. Collections are rows in a `collections`
//! table and every segment group is a row keyed by `(collection, group_index)`.
//! Cosine distance is computed in Rust over the collection's embeddings.

use super::{check_embedding_count, cosine_distance, nearest, QueryHit, VectorStore};
use crate::chunking::SegmentGroup;
use crate::embedding::Embedder;
use crate::error::{PinpointError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS segments (
        collection TEXT NOT NULL,
        group_index INTEGER NOT NULL,
        id TEXT NOT NULL,
        video_id TEXT NOT NULL,
        start_time REAL NOT NULL,
        end_time REAL NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (collection, group_index)
    );
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PinpointError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn collection_exists(conn: &Connection, collection: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_collection(conn: &Connection, collection: &str) -> Result<()> {
        if Self::collection_exists(conn, collection)? {
            Ok(())
        } else {
            Err(PinpointError::CollectionNotFound(collection.to_string()))
        }
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<SegmentGroup> {
        Ok(SegmentGroup {
            group_index: row.get(0)?,
            video_id: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            text: row.get(4)?,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(&self, collection: &str, display_name: &str) -> Result<()> {
        let conn = self.lock()?;
        if Self::collection_exists(&conn, collection)? {
            return Err(PinpointError::VectorStore(format!(
                "Collection already exists: {}",
                collection
            )));
        }

        conn.execute(
            "INSERT INTO collections (name, display_name, created_at) VALUES (?1, ?2, ?3)",
            params![collection, display_name, Utc::now().to_rfc3339()],
        )?;

        debug!("Created collection {} for {}", collection, display_name);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let segments = tx.execute(
            "DELETE FROM segments WHERE collection = ?1",
            params![collection],
        )?;
        let removed = tx.execute(
            "DELETE FROM collections WHERE name = ?1",
            params![collection],
        )?;
        tx.commit()?;

        if removed > 0 {
            info!("Deleted collection {} ({} groups)", collection, segments);
        }
        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn rename_collection(&self, from: &str, to: &str, display_name: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::require_collection(&conn, from)?;
        if Self::collection_exists(&conn, to)? {
            return Err(PinpointError::VectorStore(format!(
                "Collection already exists: {}",
                to
            )));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE collections SET name = ?1, display_name = ?2 WHERE name = ?3",
            params![to, display_name, from],
        )?;
        tx.execute(
            "UPDATE segments SET collection = ?1, video_id = ?2 WHERE collection = ?3",
            params![to, display_name, from],
        )?;
        tx.commit()?;

        info!("Renamed collection {} to {}", from, to);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let conn = self.lock()?;
        Self::collection_exists(&conn, collection)
    }

    #[instrument(skip(self, groups), fields(count = groups.len()))]
    async fn add(&self, collection: &str, groups: &[SegmentGroup]) -> Result<usize> {
        if !self.has_collection(collection).await? {
            return Err(PinpointError::CollectionNotFound(collection.to_string()));
        }

        let texts: Vec<String> = groups.iter().map(|g| g.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        check_embedding_count(groups.len(), embeddings.len())?;

        let conn = self.lock()?;
        // The collection may have been deleted while embedding.
        Self::require_collection(&conn, collection)?;

        let tx = conn.unchecked_transaction()?;
        for (group, embedding) in groups.iter().zip(embeddings) {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO segments
                (collection, group_index, id, video_id, start_time, end_time, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    collection,
                    group.group_index,
                    SegmentGroup::entry_id(group.group_index),
                    group.video_id,
                    group.start_time,
                    group.end_time,
                    group.text,
                    Self::embedding_to_bytes(&embedding),
                ],
            )?;
        }
        tx.commit()?;

        debug!("Added {} groups to {}", groups.len(), collection);
        Ok(groups.len())
    }

    #[instrument(skip(self, text))]
    async fn query(&self, collection: &str, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        if !self.has_collection(collection).await? {
            return Err(PinpointError::CollectionNotFound(collection.to_string()));
        }

        let query_embedding = self.embedder.embed(text).await?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT group_index, video_id, start_time, end_time, text, embedding
            FROM segments
            WHERE collection = ?1
            ORDER BY group_index
            "#,
        )?;

        let hits = stmt
            .query_map(params![collection], |row| {
                let group = Self::row_to_group(row)?;
                let embedding_bytes: Vec<u8> = row.get(5)?;
                Ok((group, embedding_bytes))
            })?
            .filter_map(|r| r.ok())
            .map(|(group, bytes)| QueryHit {
                distance: cosine_distance(&query_embedding, &Self::bytes_to_embedding(&bytes)),
                group,
            })
            .collect();

        Ok(nearest(hits, k))
    }

    async fn get(&self, collection: &str, group_indices: &[u32]) -> Result<Vec<SegmentGroup>> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)?;

        let mut indices = group_indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let mut stmt = conn.prepare(
            r#"
            SELECT group_index, video_id, start_time, end_time, text
            FROM segments
            WHERE collection = ?1 AND group_index = ?2
            "#,
        )?;

        let mut groups = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(group) = stmt
                .query_row(params![collection, index], Self::row_to_group)
                .optional()?
            {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM segments WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use tempfile::TempDir;

    fn group(i: u32, text: &str) -> SegmentGroup {
        SegmentGroup {
            video_id: "Lecture1.mp4".to_string(),
            group_index: i,
            start_time: i as f64 * 30.0,
            end_time: i as f64 * 30.0 + 29.0,
            text: text.to_string(),
        }
    }

    fn store() -> SqliteVectorStore {
        SqliteVectorStore::in_memory(Arc::new(HashEmbedder::new(128))).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = store();
        store.create_collection("c", "Lecture1.mp4").await.unwrap();
        store
            .add(
                "c",
                &[
                    group(0, "welcome to the course"),
                    group(1, "gradient descent minimizes the loss"),
                    group(2, "see you next week"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.count("c").await.unwrap(), 3);

        let hits = store.query("c", "what does gradient descent do", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].group.group_index, 1);
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].group.start_time, 30.0);
    }

    #[tokio::test]
    async fn test_get_skips_missing_and_sorts() {
        let store = store();
        store.create_collection("c", "Lecture1.mp4").await.unwrap();
        store
            .add("c", &[group(0, "a"), group(1, "b"), group(2, "c")])
            .await
            .unwrap();

        let groups = store.get("c", &[2, 9, 0, 2]).await.unwrap();
        let indices: Vec<u32> = groups.iter().map(|g| g.group_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = store();
        store.create_collection("c", "x").await.unwrap();
        assert!(store.create_collection("c", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_rename() {
        let store = store();
        store.create_collection("a", "a.mp4").await.unwrap();
        store.add("a", &[group(0, "hello world")]).await.unwrap();

        store.rename_collection("a", "b", "b.mp4").await.unwrap();
        assert!(!store.has_collection("a").await.unwrap());
        let moved = store.get("b", &[0]).await.unwrap();
        assert_eq!(moved[0].video_id, "b.mp4");

        assert!(store.delete_collection("b").await.unwrap());
        assert!(!store.delete_collection("b").await.unwrap());
        assert!(matches!(
            store.count("b").await,
            Err(PinpointError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t_616c696365").join("vectors.db");
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));

        {
            let store = SqliteVectorStore::new(&path, embedder.clone()).unwrap();
            store.create_collection("v_61", "a").await.unwrap();
            store.add("v_61", &[group(0, "persisted")]).await.unwrap();
        }

        let store = SqliteVectorStore::new(&path, embedder).unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["v_61".to_string()]);
        assert_eq!(store.count("v_61").await.unwrap(), 1);
    }
}
