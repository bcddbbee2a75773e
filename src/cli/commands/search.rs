//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::QueryPipeline;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    tenant: &str,
    query: &str,
    video: Option<&str>,
    limit: usize,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Query, &settings)?;

    let (services, tenant) = super::open(settings, tenant)?;
    let pipeline = QueryPipeline::from_services(&services).await?;

    let spinner = Output::spinner("Searching...");
    let results = match video {
        Some(name) => pipeline.search_video(&tenant, name, query, limit).await,
        None => pipeline.search(&tenant, query).await,
    };
    spinner.finish_and_clear();

    let results = results?;
    if results.is_empty() {
        Output::warning("No relevant passages found.");
        return Ok(());
    }

    Output::header(&format!("Results for \"{}\"", query));
    for (i, candidate) in results.iter().enumerate() {
        Output::candidate(i + 1, candidate);
    }
    println!();

    Ok(())
}
