//! CLI output formatting utilities.

use crate::orchestrator::{VideoAsset, VideoState};
use crate::retrieval::Candidate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one stored video.
    pub fn video_info(video: &VideoAsset) {
        let state = match (video.state, video.progress, video.group_count) {
            (VideoState::Processing, Some(p), _) => style(format!("processing {}%", p)).yellow(),
            (VideoState::Ready, _, Some(n)) => style(format!("ready, {} passages", n)).green(),
            (VideoState::Uploaded, _, _) => style("not indexed".to_string()).dim(),
            (state, _, _) => style(format!("{:?}", state).to_lowercase()),
        };
        println!(
            "  {} {} ({}, {})",
            style("*").cyan(),
            style(&video.display_name).bold(),
            format_size(video.size_bytes),
            state
        );
    }

    /// Print a retrieved passage.
    pub fn candidate(rank: usize, candidate: &Candidate) {
        let score = match candidate.rerank_score {
            Some(score) => format!("score: {:.2}", score),
            None => format!("distance: {:.3}", candidate.distance),
        };
        println!(
            "\n{} {} @ {} ({})",
            style(format!("[{}]", rank)).green(),
            style(&candidate.video_id).bold(),
            style(candidate.timestamp()).cyan(),
            score
        );
        println!("   {}", content_preview(&candidate.expanded_text, 200));
    }

    /// Create a percentage progress bar.
    pub fn progress_bar(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format file size in human-readable format.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_len {
        content
    } else {
        let cut: String = content.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
