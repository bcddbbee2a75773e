//! Job and notification commands.

use crate::cli::{JobsAction, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;

/// Run the jobs command.
pub async fn run_jobs(tenant: &str, action: &JobsAction, settings: Settings) -> Result<()> {
    let (services, tenant) = super::open(settings, tenant)?;

    match action {
        JobsAction::List => {
            let active = services.jobs().list_active(&tenant).await?;
            if active.is_empty() {
                Output::info("No active jobs.");
                return Ok(());
            }
            Output::header("Active jobs");
            for job in active {
                let cancel = if job.cancel_requested { " (cancelling)" } else { "" };
                Output::list_item(&format!(
                    "{} - {} {}%{} [{}]",
                    style(&job.video_id).bold(),
                    job.stage.label(),
                    job.progress,
                    cancel,
                    style(job.job_id).dim()
                ));
            }
        }

        JobsAction::Cancel { name, force } => {
            let orchestrator = Orchestrator::new(services);
            if *force {
                orchestrator.force_abandon(&tenant, name).await?;
                Output::success(&format!("Dropped job record for {}.", name));
            } else if orchestrator.cancel(&tenant, name).await? {
                Output::success(&format!("Cancellation requested for {}.", name));
            } else {
                Output::warning(&format!("No active job for {}.", name));
            }
        }
    }

    Ok(())
}

/// Print and clear pending notifications.
pub async fn run_notifications(tenant: &str, settings: Settings) -> Result<()> {
    let (services, tenant) = super::open(settings, tenant)?;
    let notifications = services.jobs().drain_notifications(&tenant).await?;

    if notifications.is_empty() {
        Output::info("No new notifications.");
    }
    for n in notifications {
        let line = format!(
            "{} {}",
            style(n.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            n.message
        );
        match n.outcome {
            crate::jobs::JobOutcome::Completed => Output::success(&line),
            _ => Output::warning(&line),
        }
    }

    Ok(())
}
