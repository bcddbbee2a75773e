//! SQLite-backed job store.
//!
//! Each record is one JSON document keyed by `(tenant, video_id)` and always
//! written with `INSERT OR REPLACE`, so a concurrent reader sees either the
//! previous or the next complete record.

use super::{JobRecord, JobStage, JobStore, Notification};
use crate::error::{PinpointError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        tenant TEXT NOT NULL,
        video_id TEXT NOT NULL,
        record TEXT NOT NULL,
        PRIMARY KEY (tenant, video_id)
    );

    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant TEXT NOT NULL,
        payload TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_notifications_tenant ON notifications(tenant);
"#;

/// Durable job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the job database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite job store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PinpointError::TransientIo(format!("Failed to acquire lock: {}", e)))
    }

    /// Parse a stored record. Unreadable records are treated as absent.
    fn parse_record(tenant: &TenantId, video_id: &str, json: &str) -> Option<JobRecord> {
        match serde_json::from_str::<JobRecord>(json) {
            Ok(record) => Some(record),
            Err(e) => {
                let err = PinpointError::TransientIo(e.to_string());
                warn!("Ignoring job record for {}/{}: {}", tenant, video_id, err);
                None
            }
        }
    }

    fn load(conn: &Connection, tenant: &TenantId, video_id: &str) -> Result<Option<JobRecord>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM jobs WHERE tenant = ?1 AND video_id = ?2",
                params![tenant.as_str(), video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json.and_then(|j| Self::parse_record(tenant, video_id, &j)))
    }

    fn store(conn: &Connection, record: &JobRecord) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO jobs (tenant, video_id, record) VALUES (?1, ?2, ?3)",
            params![
                record.tenant.as_str(),
                record.video_id,
                serde_json::to_string(record)?
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn begin(&self, tenant: &TenantId, video_id: &str) -> Result<JobRecord> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        if Self::load(&tx, tenant, video_id)?.is_some() {
            return Err(PinpointError::JobAlreadyActive(video_id.to_string()));
        }
        let record = JobRecord::queued(tenant, video_id);
        Self::store(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    async fn upsert(
        &self,
        tenant: &TenantId,
        video_id: &str,
        job_id: Uuid,
        progress: u8,
        stage: JobStage,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut record = match Self::load(&tx, tenant, video_id)? {
            Some(record) if record.job_id == job_id => record,
            _ => return Ok(false),
        };
        record.advance(progress, stage);
        Self::store(&tx, &record)?;
        tx.commit()?;
        Ok(true)
    }

    async fn request_cancel(&self, tenant: &TenantId, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let Some(mut record) = Self::load(&tx, tenant, video_id)? else {
            return Ok(false);
        };
        record.cancel_requested = true;
        Self::store(&tx, &record)?;
        tx.commit()?;
        Ok(true)
    }

    async fn get(&self, tenant: &TenantId, video_id: &str) -> Result<Option<JobRecord>> {
        let conn = self.lock()?;
        Self::load(&conn, tenant, video_id)
    }

    async fn clear(&self, tenant: &TenantId, video_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM jobs WHERE tenant = ?1 AND video_id = ?2",
            params![tenant.as_str(), video_id],
        )?;
        Ok(())
    }

    async fn list_active(&self, tenant: &TenantId) -> Result<Vec<JobRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT video_id, record FROM jobs WHERE tenant = ?1 ORDER BY video_id")?;
        let rows = stmt
            .query_map(params![tenant.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(video_id, json)| Self::parse_record(tenant, &video_id, &json))
            .collect())
    }

    async fn notify(&self, tenant: &TenantId, notification: Notification) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (tenant, payload) VALUES (?1, ?2)",
            params![tenant.as_str(), serde_json::to_string(&notification)?],
        )?;
        Ok(())
    }

    async fn drain_notifications(&self, tenant: &TenantId) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let payloads = {
            let mut stmt =
                tx.prepare("SELECT payload FROM notifications WHERE tenant = ?1 ORDER BY id")?;
            let rows: Vec<String> = stmt
                .query_map(params![tenant.as_str()], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };
        tx.execute(
            "DELETE FROM notifications WHERE tenant = ?1",
            params![tenant.as_str()],
        )?;
        tx.commit()?;

        Ok(payloads
            .iter()
            .filter_map(|p| match serde_json::from_str::<Notification>(p) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("Dropping unreadable notification for {}: {}", tenant, e);
                    None
                }
            })
            .collect())
    }
}
