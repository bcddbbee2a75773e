//! Video library commands.

use crate::cli::{Output, VideosAction};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the videos command.
pub async fn run_videos(tenant: &str, action: &VideosAction, settings: Settings) -> Result<()> {
    let (services, tenant) = super::open(settings, tenant)?;
    let orchestrator = Orchestrator::new(services);

    match action {
        VideosAction::List => {
            let videos = orchestrator.list_videos(&tenant).await?;
            if videos.is_empty() {
                Output::info("No videos yet. Add one with: pinpoint ingest <file>");
                return Ok(());
            }
            Output::header(&format!("Videos ({})", videos.len()));
            for video in &videos {
                Output::video_info(video);
            }
        }

        VideosAction::Delete { name } => {
            orchestrator.delete_video(&tenant, name).await?;
            Output::success(&format!("Deleted {}.", name));
        }

        VideosAction::Rename { old, new } => {
            orchestrator.rename_video(&tenant, old, new).await?;
            Output::success(&format!("Renamed {} to {}.", old, new));
        }
    }

    Ok(())
}
