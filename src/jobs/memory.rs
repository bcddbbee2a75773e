//! In-process job registry.

use super::{JobRecord, JobStage, JobStore, Notification};
use crate::error::{PinpointError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Registry {
    records: HashMap<TenantId, BTreeMap<String, JobRecord>>,
    notifications: HashMap<TenantId, Vec<Notification>>,
}

/// Job store kept in process memory. Lost on exit.
#[derive(Default)]
pub struct MemoryJobStore {
    registry: RwLock<Registry>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|e| PinpointError::TransientIo(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|e| PinpointError::TransientIo(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn begin(&self, tenant: &TenantId, video_id: &str) -> Result<JobRecord> {
        let mut registry = self.write()?;
        let records = registry.records.entry(tenant.clone()).or_default();
        if records.contains_key(video_id) {
            return Err(PinpointError::JobAlreadyActive(video_id.to_string()));
        }
        let record = JobRecord::queued(tenant, video_id);
        records.insert(video_id.to_string(), record.clone());
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
        let mut registry = self.write()?;
        match registry
            .records
            .get_mut(tenant)
            .and_then(|records| records.get_mut(video_id))
        {
            Some(record) if record.job_id == job_id => {
                record.advance(progress, stage);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn request_cancel(&self, tenant: &TenantId, video_id: &str) -> Result<bool> {
        let mut registry = self.write()?;
        match registry
            .records
            .get_mut(tenant)
            .and_then(|records| records.get_mut(video_id))
        {
            Some(record) => {
                record.cancel_requested = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, tenant: &TenantId, video_id: &str) -> Result<Option<JobRecord>> {
        Ok(self
            .read()?
            .records
            .get(tenant)
            .and_then(|records| records.get(video_id))
            .cloned())
    }

    async fn clear(&self, tenant: &TenantId, video_id: &str) -> Result<()> {
        if let Some(records) = self.write()?.records.get_mut(tenant) {
            records.remove(video_id);
        }
        Ok(())
    }

    async fn list_active(&self, tenant: &TenantId) -> Result<Vec<JobRecord>> {
        Ok(self
            .read()?
            .records
            .get(tenant)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn notify(&self, tenant: &TenantId, notification: Notification) -> Result<()> {
        self.write()?
            .notifications
            .entry(tenant.clone())
            .or_default()
            .push(notification);
        Ok(())
    }

    async fn drain_notifications(&self, tenant: &TenantId) -> Result<Vec<Notification>> {
        Ok(self
            .write()?
            .notifications
            .remove(tenant)
            .unwrap_or_default())
    }
}
