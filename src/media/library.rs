//! Per-tenant media storage.
//!
//! Layout: `<tenants_dir>/<tenant dir>/media/<display name>` and
//! `<tenants_dir>/<tenant dir>/previews/<display name>.jpg`.

use crate::error::{PinpointError, Result};
use crate::tenant::TenantId;
use crate::vector_store::naming::tenant_dir_name;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// File extensions accepted for upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Check that a display name can be stored as a single file in the tenant's media directory.
pub fn validate_display_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PinpointError::InvalidInput("video name is empty".to_string()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(PinpointError::InvalidInput(format!(
            "video name must be a plain file name: {:?}",
            name
        )));
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PinpointError::InvalidInput(format!(
            "unsupported video type {:?} (expected one of {})",
            name,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Uploaded media for every tenant.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    tenants_dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(tenants_dir: impl Into<PathBuf>) -> Self {
        Self {
            tenants_dir: tenants_dir.into(),
        }
    }

    fn tenant_root(&self, tenant: &TenantId) -> PathBuf {
        self.tenants_dir.join(tenant_dir_name(tenant.as_str()))
    }

    fn media_dir(&self, tenant: &TenantId) -> PathBuf {
        self.tenant_root(tenant).join("media")
    }

    /// Path where a video's media file lives (whether or not it exists).
    pub fn media_path(&self, tenant: &TenantId, name: &str) -> Result<PathBuf> {
        validate_display_name(name)?;
        Ok(self.media_dir(tenant).join(name))
    }

    /// Path of a video's preview thumbnail.
    pub fn preview_path(&self, tenant: &TenantId, name: &str) -> Result<PathBuf> {
        validate_display_name(name)?;
        Ok(self
            .tenant_root(tenant)
            .join("previews")
            .join(format!("{}.jpg", name)))
    }

    pub async fn exists(&self, tenant: &TenantId, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.media_path(tenant, name)?).await?)
    }

    /// Store uploaded bytes. The file appears under its final name only once fully written.
    #[instrument(skip(self, bytes), fields(tenant = %tenant, size = bytes.len()))]
    pub async fn store(&self, tenant: &TenantId, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.media_path(tenant, name)?;
        let dir = self.media_dir(tenant);
        tokio::fs::create_dir_all(&dir).await?;

        let staging = dir.join(format!(".{}.{}.part", name, uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!("Stored media {:?} ({} bytes)", name, bytes.len());
        Ok(path)
    }

    /// Remove a video's media and preview. Returns whether the media existed.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn remove(&self, tenant: &TenantId, name: &str) -> Result<bool> {
        let existed = remove_if_exists(&self.media_path(tenant, name)?).await?;
        remove_if_exists(&self.preview_path(tenant, name)?).await?;
        debug!("Removed media {:?} (existed: {})", name, existed);
        Ok(existed)
    }

    /// Move a video's media (and preview, if any) to a new display name.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn rename(&self, tenant: &TenantId, old: &str, new: &str) -> Result<()> {
        let from = self.media_path(tenant, old)?;
        let to = self.media_path(tenant, new)?;
        if !tokio::fs::try_exists(&from).await? {
            return Err(PinpointError::VideoNotFound(old.to_string()));
        }
        tokio::fs::rename(&from, &to).await?;

        let preview_from = self.preview_path(tenant, old)?;
        if tokio::fs::try_exists(&preview_from).await? {
            tokio::fs::rename(&preview_from, self.preview_path(tenant, new)?).await?;
        }
        Ok(())
    }

    /// Display names and sizes of every stored video, sorted by name.
    pub async fn list(&self, tenant: &TenantId) -> Result<Vec<(String, u64)>> {
        let dir = self.media_dir(tenant);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut videos = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || validate_display_name(&name).is_err() {
                continue;
            }
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            videos.push((name, size));
        }

        videos.sort();
        Ok(videos)
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
