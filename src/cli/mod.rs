//! CLI module for Pinpoint.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Pinpoint - Ask questions across your video library
///
/// Upload videos, let them be transcribed and indexed in the background,
/// then search or ask questions and get answers with timestamps.
#[derive(Parser, Debug)]
#[command(name = "pinpoint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Tenant to act as
    #[arg(short, long, global = true, env = "PINPOINT_TENANT", default_value = "default")]
    pub tenant: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Upload a video file and ingest it, showing progress
    Ingest {
        /// Path to the video file
        file: String,

        /// Name to store the video under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Ask a question and get an answer from your video library
    Ask {
        /// The question to ask
        question: String,
    },

    /// Search for relevant passages
    Search {
        /// Search query
        query: String,

        /// Search a single video by raw distance instead of the whole library
        #[arg(long)]
        video: Option<String>,

        /// Maximum number of results when searching a single video
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Inspect or cancel ingestion jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Print and clear pending job notifications
    Notifications,

    /// Manage stored videos
    Videos {
        #[command(subcommand)]
        action: VideosAction,
    },

    /// Start HTTP API server for upload and query clients
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// List active jobs
    List,

    /// Request cancellation of a running job
    Cancel {
        /// Video name
        name: String,

        /// Drop the job record instead of waiting for the worker to notice
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum VideosAction {
    /// List stored videos and their state
    List,

    /// Delete a video and its index
    Delete {
        /// Video name
        name: String,
    },

    /// Rename a video
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "retrieval.final_top_k")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}
