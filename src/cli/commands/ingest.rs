//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::jobs::JobOutcome;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the ingest command: upload a local file and follow its job.
///
/// Ctrl+C requests cancellation; the job then unwinds at its next checkpoint.
pub async fn run_ingest(tenant: &str, file: &str, name: Option<&str>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'pinpoint doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let path = Path::new(file);
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Cannot derive a video name from {}", file))?,
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", file))?;

    let (services, tenant) = super::open(settings, tenant)?;
    let orchestrator = Orchestrator::new(services.clone());
    let handle = orchestrator.upload(&tenant, &name, &bytes).await?;
    Output::info(&format!("Ingesting {} (job {})", name, handle.job_id));

    let jobs = services.jobs();
    let pb = Output::progress_bar("Queued");
    let wait = handle.wait();
    tokio::pin!(wait);
    let mut cancel_sent = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                pb.set_message("Cancelling...");
                orchestrator.cancel(&tenant, &name).await?;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                if let Ok(Some(record)) = jobs.get(&tenant, &name).await {
                    pb.set_position(record.progress as u64);
                    if !cancel_sent {
                        pb.set_message(record.stage.label());
                    }
                }
            }
        }
    };
    pb.finish_and_clear();

    match outcome {
        JobOutcome::Completed => {
            Output::success(&format!("{} is ready to search.", name));
            Ok(())
        }
        JobOutcome::Cancelled => {
            Output::warning(&format!("Ingestion of {} was cancelled.", name));
            Ok(())
        }
        JobOutcome::Failed => {
            Output::error(&format!("Ingestion of {} failed. Run with -v for details.", name));
            anyhow::bail!("ingestion failed")
        }
    }
}
