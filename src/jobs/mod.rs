//! Per-(tenant, video) ingestion job records and completion notifications.
//!
//! A record exists only while its video is being processed. Its absence is
//! meaningful: a worker that finds its record gone has been abandoned and
//! must unwind.

mod memory;
mod sqlite;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

use crate::error::Result;
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stage label shown next to a job's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Initializing,
    Transcribing,
    Indexing,
    Done,
    Error,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Initializing => "initializing",
            JobStage::Transcribing => "transcribing",
            JobStage::Indexing => "indexing",
            JobStage::Done => "done",
            JobStage::Error => "error",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            JobStage::Queued => "Queued",
            JobStage::Initializing => "Initializing",
            JobStage::Transcribing => "Transcribing",
            JobStage::Indexing => "Indexing",
            JobStage::Done => "Done",
            JobStage::Error => "Error",
        }
    }
}

impl FromStr for JobStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStage::Queued),
            "initializing" => Ok(JobStage::Initializing),
            "transcribing" => Ok(JobStage::Transcribing),
            "indexing" => Ok(JobStage::Indexing),
            "done" => Ok(JobStage::Done),
            "error" => Ok(JobStage::Error),
            _ => Err(format!("Invalid job stage: {}", s)),
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress record of one in-flight ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub tenant: TenantId,
    pub video_id: String,
    pub job_id: Uuid,
    /// Percentage in `[0, 100]`.
    pub progress: u8,
    pub stage: JobStage,
    pub cancel_requested: bool,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A fresh record at 0% in the `Queued` stage.
    pub fn queued(tenant: &TenantId, video_id: &str) -> Self {
        Self {
            tenant: tenant.clone(),
            video_id: video_id.to_string(),
            job_id: Uuid::new_v4(),
            progress: 0,
            stage: JobStage::Queued,
            cancel_requested: false,
            updated_at: Utc::now(),
        }
    }

    /// Apply a progress update, keeping identity and the cancel flag.
    pub(crate) fn advance(&mut self, progress: u8, stage: JobStage) {
        self.progress = progress.min(100);
        self.stage = stage;
        self.updated_at = Utc::now();
    }
}

/// Terminal outcome of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed => write!(f, "completed"),
            JobOutcome::Failed => write!(f, "failed"),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One-shot message about a finished job, consumed by [`JobStore::drain_notifications`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub video_id: String,
    pub outcome: JobOutcome,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(video_id: &str, outcome: JobOutcome, message: impl Into<String>) -> Self {
        Self {
            video_id: video_id.to_string(),
            outcome,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Durable record of ingestion progress, cancel requests and notifications.
///
/// Readers and the single writing worker may run concurrently; every record
/// is replaced whole so a reader never sees a torn value. A record that
/// cannot be parsed reads as absent.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a `Queued` record. Fails with `JobAlreadyActive` if one exists.
    async fn begin(&self, tenant: &TenantId, video_id: &str) -> Result<JobRecord>;

    /// Set progress and stage on the record owned by `job_id`, last write wins.
    ///
    /// Never recreates a cleared record and never touches another job's
    /// record. Returns whether a record was updated.
    async fn upsert(
        &self,
        tenant: &TenantId,
        video_id: &str,
        job_id: Uuid,
        progress: u8,
        stage: JobStage,
    ) -> Result<bool>;

    /// Flag a job for cancellation. Returns whether a record existed.
    async fn request_cancel(&self, tenant: &TenantId, video_id: &str) -> Result<bool>;

    /// Current record, or `None` if there is none or it is unreadable.
    async fn get(&self, tenant: &TenantId, video_id: &str) -> Result<Option<JobRecord>>;

    /// Delete the record.
    async fn clear(&self, tenant: &TenantId, video_id: &str) -> Result<()>;

    /// Snapshot of all readable records of a tenant, ordered by video.
    async fn list_active(&self, tenant: &TenantId) -> Result<Vec<JobRecord>>;

    /// Queue a notification for the tenant.
    async fn notify(&self, tenant: &TenantId, notification: Notification) -> Result<()>;

    /// Return and remove every pending notification, oldest first.
    async fn drain_notifications(&self, tenant: &TenantId) -> Result<Vec<Notification>>;
}
