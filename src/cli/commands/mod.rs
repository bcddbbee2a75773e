//! CLI command implementations.

mod ask;
mod config;
mod doctor;
mod ingest;
mod jobs;
mod search;
mod serve;
mod videos;

pub use ask::run_ask;
pub use config::{run_config, set_value};
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use jobs::{run_jobs, run_notifications};
pub use search::run_search;
pub use serve::{router, run_serve};
pub use videos::run_videos;

use crate::config::Settings;
use crate::services::Services;
use crate::tenant::TenantId;
use std::sync::Arc;

/// Services and tenant for a one-shot command.
fn open(settings: Settings, tenant: &str) -> anyhow::Result<(Arc<Services>, TenantId)> {
    let tenant = TenantId::new(tenant)?;
    let services = Arc::new(Services::new(settings)?);
    Ok((services, tenant))
}
