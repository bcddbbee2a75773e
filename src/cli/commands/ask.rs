//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{AnswerStrategy, QueryPipeline};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(tenant: &str, question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'pinpoint doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let (services, tenant) = super::open(settings, tenant)?;
    let pipeline = QueryPipeline::from_services(&services).await?;

    let spinner = Output::spinner("Searching your videos...");
    let answer = pipeline.ask(&tenant, question).await;
    spinner.finish_and_clear();

    let answer = match answer {
        Ok(answer) => answer,
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    };

    if let Some(notice) = &answer.notice {
        Output::warning(notice);
    }
    println!("\n{}\n", answer.format_for_display());

    if answer.strategy == AnswerStrategy::Secondary {
        if let Some(model) = &answer.model {
            Output::info(&format!("Answered by fallback model {}", model));
        }
    }

    Ok(())
}
