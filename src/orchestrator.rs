//! Ingestion orchestrator for Pinpoint.
//!
//! Turns an uploaded video into a searchable collection:
//! preview → transcribe → group → index → notify. Each job runs on its own
//! tokio task, which is the only writer of that job's record.
//!
//! Cancellation is cooperative. It is observed at three checkpoints: before
//! transcription, right after it, and before every index batch. The
//! transcription call itself cannot be interrupted, so the worst-case
//! cancellation latency is one full transcription.

use crate::chunking::group_segments;
use crate::error::{PinpointError, Result};
use crate::jobs::{JobOutcome, JobStage, JobStore, Notification};
use crate::media::validate_display_name;
use crate::services::Services;
use crate::tenant::TenantId;
use crate::vector_store::naming::collection_name;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const PROGRESS_INITIALIZING: u8 = 5;
const PROGRESS_TRANSCRIBING: u8 = 15;
const PROGRESS_INDEXING_START: u8 = 30;
const PROGRESS_INDEXING_SPAN: usize = 60;
const PROGRESS_DONE: u8 = 100;

/// Progress after `written` of `total` groups are indexed (30..=90, monotonic).
fn indexing_progress(written: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_INDEXING_START + PROGRESS_INDEXING_SPAN as u8;
    }
    let span = PROGRESS_INDEXING_SPAN * written.min(total) / total;
    PROGRESS_INDEXING_START + span as u8
}

/// Lifecycle state of a stored video, derived from media, job record and collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoState {
    /// Media stored, not indexed, no job running.
    Uploaded,
    /// An ingestion job is in flight.
    Processing,
    /// Indexed and searchable.
    Ready,
}

/// A video in a tenant's library.
#[derive(Debug, Clone, Serialize)]
pub struct VideoAsset {
    pub display_name: String,
    pub state: VideoState,
    pub size_bytes: u64,
    /// Indexed segment groups, when ready.
    pub group_count: Option<usize>,
    /// Job progress, when processing.
    pub progress: Option<u8>,
}

/// View of one job's record, checked at cancellation checkpoints.
#[derive(Clone)]
pub struct CancellationToken {
    jobs: Arc<dyn JobStore>,
    tenant: TenantId,
    video_id: String,
    job_id: Uuid,
}

impl CancellationToken {
    pub fn new(jobs: Arc<dyn JobStore>, tenant: TenantId, video_id: &str, job_id: Uuid) -> Self {
        Self {
            jobs,
            tenant,
            video_id: video_id.to_string(),
            job_id,
        }
    }

    /// `Err(Cancelled)` if cancellation was requested or the record is gone
    /// (abandoned) or belongs to a newer job.
    pub async fn check(&self) -> Result<()> {
        let record = match self.jobs.get(&self.tenant, &self.video_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not read job record for {}: {}", self.video_id, e);
                return Ok(());
            }
        };

        match record {
            None => Err(PinpointError::Cancelled(format!(
                "{} (job record abandoned)",
                self.video_id
            ))),
            Some(r) if r.job_id != self.job_id => Err(PinpointError::Cancelled(format!(
                "{} (superseded by job {})",
                self.video_id, r.job_id
            ))),
            Some(r) if r.cancel_requested => Err(PinpointError::Cancelled(self.video_id.clone())),
            Some(_) => Ok(()),
        }
    }

    /// Whether a different job now owns this video's record.
    async fn superseded(&self) -> bool {
        matches!(
            self.jobs.get(&self.tenant, &self.video_id).await,
            Ok(Some(r)) if r.job_id != self.job_id
        )
    }
}

/// Handle to a running ingestion job. Dropping it does not stop the job.
pub struct JobHandle {
    pub video_id: String,
    pub job_id: Uuid,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// Wait for the job to finish.
    pub async fn wait(self) -> JobOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Ingestion task for {} panicked: {}", self.video_id, e);
                JobOutcome::Failed
            }
        }
    }
}

/// Coordinates ingestion jobs and library operations.
#[derive(Clone)]
pub struct Orchestrator {
    services: Arc<Services>,
}

impl Orchestrator {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Store uploaded bytes and start ingesting them.
    ///
    /// Fails with `JobAlreadyActive` if the video is already being processed;
    /// the running job's media is left untouched.
    #[instrument(skip(self, bytes), fields(tenant = %tenant, size = bytes.len()))]
    pub async fn upload(&self, tenant: &TenantId, name: &str, bytes: &[u8]) -> Result<JobHandle> {
        validate_display_name(name)?;
        let jobs = self.services.jobs();
        let record = jobs.begin(tenant, name).await?;

        if let Err(e) = self.services.media().store(tenant, name, bytes).await {
            jobs.clear(tenant, name).await?;
            return Err(e);
        }

        Ok(self.spawn(tenant.clone(), name.to_string(), record.job_id))
    }

    /// Start ingesting media that is already stored.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn submit(&self, tenant: &TenantId, name: &str) -> Result<JobHandle> {
        validate_display_name(name)?;
        if !self.services.media().exists(tenant, name).await? {
            return Err(PinpointError::VideoNotFound(name.to_string()));
        }
        let record = self.services.jobs().begin(tenant, name).await?;
        Ok(self.spawn(tenant.clone(), name.to_string(), record.job_id))
    }

    fn spawn(&self, tenant: TenantId, name: String, job_id: Uuid) -> JobHandle {
        let orchestrator = self.clone();
        let token = CancellationToken::new(self.services.jobs(), tenant.clone(), &name, job_id);
        let video_id = name.clone();
        let task = tokio::spawn(async move { orchestrator.run(tenant, name, token).await });
        info!("Started ingestion job {} for {}", job_id, video_id);
        JobHandle {
            video_id,
            job_id,
            task,
        }
    }

    /// Request cooperative cancellation. Returns whether a job was running.
    pub async fn cancel(&self, tenant: &TenantId, name: &str) -> Result<bool> {
        let found = self.services.jobs().request_cancel(tenant, name).await?;
        if found {
            info!("Cancellation requested for {}", name);
        }
        Ok(found)
    }

    /// Drop a job's record. Its worker unwinds at the next checkpoint.
    pub async fn force_abandon(&self, tenant: &TenantId, name: &str) -> Result<()> {
        warn!("Force-abandoning job for {}", name);
        self.services.jobs().clear(tenant, name).await
    }

    /// Delete a video's collection, media and preview.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn delete_video(&self, tenant: &TenantId, name: &str) -> Result<()> {
        validate_display_name(name)?;
        self.ensure_idle(tenant, name).await?;

        let store = self.services.stores().await?.for_tenant(tenant)?;
        let had_collection = store.delete_collection(&collection_name(name)).await?;
        let had_media = self.services.media().remove(tenant, name).await?;

        if !had_collection && !had_media {
            return Err(PinpointError::VideoNotFound(name.to_string()));
        }
        info!("Deleted video {}", name);
        Ok(())
    }

    /// Rename a video, moving its media and migrating its collection.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn rename_video(&self, tenant: &TenantId, old: &str, new: &str) -> Result<()> {
        validate_display_name(old)?;
        validate_display_name(new)?;
        if old == new {
            return Ok(());
        }
        self.ensure_idle(tenant, old).await?;
        self.ensure_idle(tenant, new).await?;

        let media = self.services.media();
        if media.exists(tenant, new).await? {
            return Err(PinpointError::InvalidInput(format!(
                "a video named {:?} already exists",
                new
            )));
        }
        media.rename(tenant, old, new).await?;

        let store = self.services.stores().await?.for_tenant(tenant)?;
        let from = collection_name(old);
        let to = collection_name(new);
        if store.has_collection(&from).await? {
            if store.delete_collection(&to).await? {
                debug!("Removed stale collection for {}", new);
            }
            store.rename_collection(&from, &to, new).await?;
        }

        info!("Renamed video {} to {}", old, new);
        Ok(())
    }

    /// Every stored video with its derived state.
    pub async fn list_videos(&self, tenant: &TenantId) -> Result<Vec<VideoAsset>> {
        let store = self.services.stores().await?.for_tenant(tenant)?;
        let active = self.services.jobs().list_active(tenant).await?;

        let mut assets = Vec::new();
        for (name, size_bytes) in self.services.media().list(tenant).await? {
            let asset = if let Some(job) = active.iter().find(|j| j.video_id == name) {
                VideoAsset {
                    display_name: name,
                    state: VideoState::Processing,
                    size_bytes,
                    group_count: None,
                    progress: Some(job.progress),
                }
            } else {
                let collection = collection_name(&name);
                let group_count = if store.has_collection(&collection).await? {
                    Some(store.count(&collection).await?)
                } else {
                    None
                };
                VideoAsset {
                    display_name: name,
                    state: if group_count.is_some() {
                        VideoState::Ready
                    } else {
                        VideoState::Uploaded
                    },
                    size_bytes,
                    group_count,
                    progress: None,
                }
            };
            assets.push(asset);
        }
        Ok(assets)
    }

    async fn ensure_idle(&self, tenant: &TenantId, name: &str) -> Result<()> {
        if self.services.jobs().get(tenant, name).await?.is_some() {
            return Err(PinpointError::JobAlreadyActive(name.to_string()));
        }
        Ok(())
    }

    /// Record progress on the token's own record. A cleared or superseded
    /// record is left as it is, so the next checkpoint sees it.
    async fn progress(&self, token: &CancellationToken, progress: u8, stage: JobStage) {
        match self
            .services
            .jobs()
            .upsert(&token.tenant, &token.video_id, token.job_id, progress, stage)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("No live record for {}, progress not recorded", token.video_id),
            Err(e) => warn!("Failed to record progress for {}: {}", token.video_id, e),
        }
    }

    /// Drive one job to a terminal outcome. Always leaves no job record behind.
    #[instrument(skip(self, token), fields(tenant = %tenant, video = %name))]
    async fn run(&self, tenant: TenantId, name: String, token: CancellationToken) -> JobOutcome {
        let jobs = self.services.jobs();
        let settings = &self.services.settings().ingest;

        match self.ingest(&tenant, &name, &token).await {
            Ok(groups) => {
                info!("Indexed {} groups for {}", groups, name);
                if let Err(e) = jobs
                    .notify(
                        &tenant,
                        Notification::new(
                            &name,
                            JobOutcome::Completed,
                            format!("{} is ready ({} passages indexed)", name, groups),
                        ),
                    )
                    .await
                {
                    warn!("Failed to queue notification for {}: {}", name, e);
                }
                self.progress(&token, PROGRESS_DONE, JobStage::Done).await;
                tokio::time::sleep(Duration::from_millis(settings.completion_hold_ms)).await;
                self.clear(&tenant, &name).await;
                JobOutcome::Completed
            }
            Err(PinpointError::Cancelled(reason)) => {
                info!("Ingestion cancelled: {}", reason);
                if token.superseded().await {
                    debug!("A newer job owns {}, leaving its data alone", name);
                    return JobOutcome::Cancelled;
                }
                self.teardown(&tenant, &name).await;
                if let Err(e) = self.services.media().remove(&tenant, &name).await {
                    warn!("Failed to remove media for {}: {}", name, e);
                }
                self.clear(&tenant, &name).await;
                JobOutcome::Cancelled
            }
            Err(e) => {
                error!("Ingestion failed for {}: {}", name, e);
                if token.superseded().await {
                    debug!("A newer job owns {}, leaving its data alone", name);
                    return JobOutcome::Failed;
                }
                let last = match jobs.get(&tenant, &name).await {
                    Ok(Some(record)) => record.progress,
                    _ => 0,
                };
                self.progress(&token, last, JobStage::Error).await;
                tokio::time::sleep(Duration::from_millis(settings.error_hold_ms)).await;
                self.teardown(&tenant, &name).await;
                if let Err(e) = jobs
                    .notify(
                        &tenant,
                        Notification::new(&name, JobOutcome::Failed, format!("{} failed: {}", name, e)),
                    )
                    .await
                {
                    warn!("Failed to queue notification for {}: {}", name, e);
                }
                self.clear(&tenant, &name).await;
                JobOutcome::Failed
            }
        }
    }

    /// Steps up to a fully written collection. Returns the number of groups indexed.
    async fn ingest(&self, tenant: &TenantId, name: &str, token: &CancellationToken) -> Result<usize> {
        let settings = &self.services.settings().ingest;
        let media = self.services.media();
        let media_path = media.media_path(tenant, name)?;

        self.progress(token, PROGRESS_INITIALIZING, JobStage::Initializing).await;
        if settings.preview {
            self.generate_preview(tenant, name, &media_path).await;
        }

        token.check().await?;

        self.progress(token, PROGRESS_TRANSCRIBING, JobStage::Transcribing).await;
        let transcriber = self.services.transcriber().await?;
        let transcript = transcriber.transcribe(&media_path).await?;
        info!("Transcribed {} segments", transcript.segments.len());

        token.check().await?;

        let groups = group_segments(name, &transcript.segments, settings.group_size);
        let total = groups.len();

        let store = self.services.stores().await?.for_tenant(tenant)?;
        let collection = collection_name(name);
        if store.delete_collection(&collection).await? {
            debug!("Replaced stale collection {}", collection);
        }
        store.create_collection(&collection, name).await?;
        self.progress(token, PROGRESS_INDEXING_START, JobStage::Indexing).await;

        let mut written = 0;
        for batch in groups.chunks(settings.index_batch_size.max(1)) {
            token.check().await?;
            written += store.add(&collection, batch).await?;
            self.progress(token, indexing_progress(written, total), JobStage::Indexing)
                .await;
        }
        if total == 0 {
            self.progress(token, indexing_progress(0, 0), JobStage::Indexing).await;
        }

        token.check().await?;
        Ok(written)
    }

    async fn generate_preview(&self, tenant: &TenantId, name: &str, media_path: &std::path::Path) {
        let result = async {
            let dest = self.services.media().preview_path(tenant, name)?;
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.services.previews().generate(media_path, &dest).await
        }
        .await;

        if let Err(e) = result {
            warn!("Preview generation failed for {}: {}", name, e);
        }
    }

    /// Remove a partially written collection.
    async fn teardown(&self, tenant: &TenantId, name: &str) {
        let result = async {
            let store = self.services.stores().await?.for_tenant(tenant)?;
            store.delete_collection(&collection_name(name)).await
        }
        .await;

        match result {
            Ok(true) => debug!("Removed partial collection for {}", name),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove collection for {}: {}", name, e),
        }
    }

    async fn clear(&self, tenant: &TenantId, name: &str) {
        if let Err(e) = self.services.jobs().clear(tenant, name).await {
            error!("Failed to clear job record for {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProvider, Settings, StoreProvider};
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::jobs::MemoryJobStore;
    use crate::media::PreviewGenerator;
    use crate::transcription::{Transcriber, Transcript, TranscriptSegment};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    type Hook = Box<dyn Fn() -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

    /// Returns fixed segments, running `during` before it returns.
    struct FakeTranscriber {
        segments: usize,
        fail: bool,
        during: Option<Hook>,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, media_path: &Path) -> Result<Transcript> {
            assert!(media_path.exists());
            if let Some(hook) = &self.during {
                hook().await;
            }
            if self.fail {
                return Err(PinpointError::Transcription("audio track missing".to_string()));
            }
            let segments = (0..self.segments)
                .map(|i| {
                    TranscriptSegment::new(i as f64 * 5.0, i as f64 * 5.0 + 4.0, format!("segment {}", i))
                })
                .collect();
            Ok(Transcript::new("video".to_string(), segments))
        }
    }

    /// Hash embedder that runs a hook on its first batch.
    struct HookedEmbedder {
        inner: HashEmbedder,
        on_first_batch: Hook,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Embedder for HookedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
                (self.on_first_batch)().await;
            }
            self.inner.embed_batch(texts).await
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    /// Writes a placeholder thumbnail, then runs a hook.
    struct HookedPreview {
        after: Hook,
    }

    #[async_trait]
    impl PreviewGenerator for HookedPreview {
        async fn generate(&self, _media_path: &Path, dest: &Path) -> Result<()> {
            tokio::fs::write(dest, b"jpg").await?;
            (self.after)().await;
            Ok(())
        }
    }

    struct Harness {
        dir: TempDir,
        jobs: Arc<MemoryJobStore>,
        tenant: TenantId,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                jobs: Arc::new(MemoryJobStore::new()),
                tenant: TenantId::new("alice").unwrap(),
            }
        }

        fn settings(&self) -> Settings {
            let mut settings = Settings::default();
            settings.general.data_dir = self.dir.path().to_string_lossy().to_string();
            settings.jobs.provider = StoreProvider::Memory;
            settings.vector_store.provider = StoreProvider::Memory;
            settings.embedding.provider = EmbeddingProvider::Hash;
            settings.ingest.index_batch_size = 1;
            settings.ingest.completion_hold_ms = 0;
            settings.ingest.error_hold_ms = 0;
            settings.ingest.preview = false;
            settings
        }

        fn services(&self, settings: Settings, transcriber: FakeTranscriber, embedder: Arc<dyn Embedder>) -> Services {
            Services::new(settings)
                .unwrap()
                .with_job_store(self.jobs.clone())
                .with_transcriber(Arc::new(transcriber))
                .with_embedder(embedder)
        }

        fn orchestrator(&self, transcriber: FakeTranscriber, embedder: Arc<dyn Embedder>) -> Orchestrator {
            Orchestrator::new(Arc::new(self.services(self.settings(), transcriber, embedder)))
        }

        /// A hook that drops the record of `name`, as a forced abandon does.
        fn abandon_hook(&self, name: &str) -> Hook {
            let jobs = self.jobs.clone();
            let tenant = self.tenant.clone();
            let name = name.to_string();
            Box::new(move || {
                let jobs = jobs.clone();
                let tenant = tenant.clone();
                let name = name.clone();
                Box::pin(async move {
                    jobs.clear(&tenant, &name).await.unwrap();
                })
            })
        }

        /// A hook that abandons `name` and starts a new job for it.
        fn supersede_hook(&self, name: &str) -> Hook {
            let jobs = self.jobs.clone();
            let tenant = self.tenant.clone();
            let name = name.to_string();
            Box::new(move || {
                let jobs = jobs.clone();
                let tenant = tenant.clone();
                let name = name.clone();
                Box::pin(async move {
                    jobs.clear(&tenant, &name).await.unwrap();
                    jobs.begin(&tenant, &name).await.unwrap();
                })
            })
        }

        async fn media_exists(&self, orchestrator: &Orchestrator, name: &str) -> bool {
            orchestrator.services().media().exists(&self.tenant, name).await.unwrap()
        }

        /// A hook that requests cancellation of `name`.
        fn cancel_hook(&self, name: &str) -> Hook {
            let jobs = self.jobs.clone();
            let tenant = self.tenant.clone();
            let name = name.to_string();
            Box::new(move || {
                let jobs = jobs.clone();
                let tenant = tenant.clone();
                let name = name.clone();
                Box::pin(async move {
                    jobs.request_cancel(&tenant, &name).await.unwrap();
                })
            })
        }

        async fn collection_exists(&self, orchestrator: &Orchestrator, name: &str) -> bool {
            let store = orchestrator
                .services()
                .stores()
                .await
                .unwrap()
                .for_tenant(&self.tenant)
                .unwrap();
            store.has_collection(&collection_name(name)).await.unwrap()
        }
    }

    fn transcriber(segments: usize) -> FakeTranscriber {
        FakeTranscriber {
            segments,
            fail: false,
            during: None,
        }
    }

    #[test]
    fn test_indexing_progress_milestones() {
        assert_eq!(indexing_progress(0, 3), 30);
        assert_eq!(indexing_progress(1, 3), 50);
        assert_eq!(indexing_progress(3, 3), 90);
        assert_eq!(indexing_progress(0, 0), 90);
        let steps: Vec<u8> = (0..=7).map(|w| indexing_progress(w, 7)).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_successful_ingestion() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(transcriber(9), Arc::new(HashEmbedder::new(64)));

        let handle = orchestrator.upload(&h.tenant, "Lecture1.mp4", b"fake video").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Completed);

        assert!(h.jobs.get(&h.tenant, "Lecture1.mp4").await.unwrap().is_none());
        let notifications = h.jobs.drain_notifications(&h.tenant).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].outcome, JobOutcome::Completed);

        let videos = orchestrator.list_videos(&h.tenant).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].state, VideoState::Ready);
        assert_eq!(videos[0].group_count, Some(3));
        assert_eq!(videos[0].size_bytes, 10);
    }

    #[tokio::test]
    async fn test_empty_transcript_gives_empty_collection() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(transcriber(0), Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "silent.mp4", b"x").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Completed);
        let videos = orchestrator.list_videos(&h.tenant).await.unwrap();
        assert_eq!(videos[0].group_count, Some(0));
    }

    #[tokio::test]
    async fn test_cancel_during_indexing_leaves_no_residue() {
        let h = Harness::new();
        let embedder = Arc::new(HookedEmbedder {
            inner: HashEmbedder::new(16),
            on_first_batch: h.cancel_hook("Lecture1.mp4"),
            fired: Default::default(),
        });
        let orchestrator = h.orchestrator(transcriber(9), embedder);

        let handle = orchestrator.upload(&h.tenant, "Lecture1.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);

        assert!(!h.collection_exists(&orchestrator, "Lecture1.mp4").await);
        assert!(!orchestrator
            .services()
            .media()
            .exists(&h.tenant, "Lecture1.mp4")
            .await
            .unwrap());
        assert!(h.jobs.get(&h.tenant, "Lecture1.mp4").await.unwrap().is_none());
        assert!(h.jobs.drain_notifications(&h.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_transcription_is_seen_afterwards() {
        let h = Harness::new();
        let mut fake = transcriber(6);
        fake.during = Some(h.cancel_hook("talk.mp4"));
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "talk.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);
        assert!(!h.collection_exists(&orchestrator, "talk.mp4").await);
        assert!(orchestrator.list_videos(&h.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_job_unwinds() {
        let h = Harness::new();
        let mut fake = transcriber(6);
        fake.during = Some(h.abandon_hook("talk.mp4"));
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "talk.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);
        assert!(!h.collection_exists(&orchestrator, "talk.mp4").await);
        assert!(h.jobs.get(&h.tenant, "talk.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_during_indexing_stays_abandoned() {
        let h = Harness::new();
        let embedder = Arc::new(HookedEmbedder {
            inner: HashEmbedder::new(16),
            on_first_batch: h.abandon_hook("Lecture1.mp4"),
            fired: Default::default(),
        });
        let orchestrator = h.orchestrator(transcriber(9), embedder);

        let handle = orchestrator.upload(&h.tenant, "Lecture1.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);

        assert!(h.jobs.get(&h.tenant, "Lecture1.mp4").await.unwrap().is_none());
        assert!(!h.collection_exists(&orchestrator, "Lecture1.mp4").await);
        assert!(!h.media_exists(&orchestrator, "Lecture1.mp4").await);
        assert!(h.jobs.drain_notifications(&h.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_during_preview_removes_thumbnail() {
        let h = Harness::new();
        let mut settings = h.settings();
        settings.ingest.preview = true;
        let services = h
            .services(settings, transcriber(3), Arc::new(HashEmbedder::new(16)))
            .with_previews(Arc::new(HookedPreview {
                after: h.abandon_hook("clip.mp4"),
            }));
        let orchestrator = Orchestrator::new(Arc::new(services));

        let handle = orchestrator.upload(&h.tenant, "clip.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);

        assert!(h.jobs.get(&h.tenant, "clip.mp4").await.unwrap().is_none());
        assert!(!h.collection_exists(&orchestrator, "clip.mp4").await);
        assert!(!h.media_exists(&orchestrator, "clip.mp4").await);
        let preview = orchestrator.services().media().preview_path(&h.tenant, "clip.mp4").unwrap();
        assert!(!preview.exists());
    }

    #[tokio::test]
    async fn test_superseded_job_leaves_newer_job_alone() {
        let h = Harness::new();
        let mut fake = transcriber(3);
        fake.during = Some(h.supersede_hook("talk.mp4"));
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "talk.mp4", b"bytes").await.unwrap();
        let old_job = handle.job_id;
        assert_eq!(handle.wait().await, JobOutcome::Cancelled);

        let record = h.jobs.get(&h.tenant, "talk.mp4").await.unwrap().unwrap();
        assert_ne!(record.job_id, old_job);
        assert_eq!(record.stage, JobStage::Queued);
        assert!(h.media_exists(&orchestrator, "talk.mp4").await);
        assert!(h.jobs.drain_notifications(&h.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_superseded_failure_leaves_newer_job_alone() {
        let h = Harness::new();
        let mut fake = transcriber(3);
        fake.fail = true;
        fake.during = Some(h.supersede_hook("broken.mp4"));
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "broken.mp4", b"bytes").await.unwrap();
        let old_job = handle.job_id;
        assert_eq!(handle.wait().await, JobOutcome::Failed);

        // The newer job's record is neither marked failed nor cleared.
        let record = h.jobs.get(&h.tenant, "broken.mp4").await.unwrap().unwrap();
        assert_ne!(record.job_id, old_job);
        assert_eq!(record.stage, JobStage::Queued);
        assert!(h.media_exists(&orchestrator, "broken.mp4").await);
        assert!(h.jobs.drain_notifications(&h.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_clears_record_and_notifies() {
        let h = Harness::new();
        let mut fake = transcriber(3);
        fake.fail = true;
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let handle = orchestrator.upload(&h.tenant, "broken.mp4", b"bytes").await.unwrap();
        assert_eq!(handle.wait().await, JobOutcome::Failed);

        assert!(h.jobs.get(&h.tenant, "broken.mp4").await.unwrap().is_none());
        let notifications = h.jobs.drain_notifications(&h.tenant).await.unwrap();
        assert_eq!(notifications[0].outcome, JobOutcome::Failed);
        assert!(notifications[0].message.contains("audio track missing"));

        // Media is kept so the upload can be retried.
        let videos = orchestrator.list_videos(&h.tenant).await.unwrap();
        assert_eq!(videos[0].state, VideoState::Uploaded);
        assert!(!h.collection_exists(&orchestrator, "broken.mp4").await);
    }

    #[tokio::test]
    async fn test_duplicate_job_is_rejected() {
        let h = Harness::new();
        let gate = Arc::new(Notify::new());
        let waiter = gate.clone();
        let mut fake = transcriber(3);
        fake.during = Some(Box::new(move || {
            let waiter = waiter.clone();
            Box::pin(async move { waiter.notified().await })
        }));
        let orchestrator = h.orchestrator(fake, Arc::new(HashEmbedder::new(16)));

        let first = orchestrator.upload(&h.tenant, "a.mp4", b"one").await.unwrap();
        assert!(matches!(
            orchestrator.upload(&h.tenant, "a.mp4", b"two").await,
            Err(PinpointError::JobAlreadyActive(_))
        ));
        assert!(matches!(
            orchestrator.delete_video(&h.tenant, "a.mp4").await,
            Err(PinpointError::JobAlreadyActive(_))
        ));

        let videos = orchestrator.list_videos(&h.tenant).await.unwrap();
        assert_eq!(videos[0].state, VideoState::Processing);

        gate.notify_one();
        assert_eq!(first.wait().await, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(transcriber(4), Arc::new(HashEmbedder::new(16)));
        orchestrator
            .upload(&h.tenant, "old.mp4", b"bytes")
            .await
            .unwrap()
            .wait()
            .await;

        orchestrator.rename_video(&h.tenant, "old.mp4", "new.mp4").await.unwrap();
        assert!(!h.collection_exists(&orchestrator, "old.mp4").await);
        assert!(h.collection_exists(&orchestrator, "new.mp4").await);
        let videos = orchestrator.list_videos(&h.tenant).await.unwrap();
        assert_eq!(videos[0].display_name, "new.mp4");
        assert_eq!(videos[0].group_count, Some(2));

        orchestrator.delete_video(&h.tenant, "new.mp4").await.unwrap();
        assert!(orchestrator.list_videos(&h.tenant).await.unwrap().is_empty());
        assert!(matches!(
            orchestrator.delete_video(&h.tenant, "new.mp4").await,
            Err(PinpointError::VideoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(transcriber(1), Arc::new(HashEmbedder::new(16)));
        assert!(matches!(
            orchestrator.upload(&h.tenant, "../escape.mp4", b"x").await,
            Err(PinpointError::InvalidInput(_))
        ));
        assert!(matches!(
            orchestrator.submit(&h.tenant, "missing.mp4").await,
            Err(PinpointError::VideoNotFound(_))
        ));
    }
}
