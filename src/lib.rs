//! Pinpoint - Ask questions across your video library
//!
//! A multi-tenant service that turns uploaded videos into a searchable
//! knowledge base and answers questions with timestamps you can jump to.
//!
//! # Overview
//!
//! Pinpoint allows you to:
//! - Upload videos and ingest them in the background with cooperative cancellation
//! - Search every video of a tenant at once, with neighbouring context attached
//! - Rerank candidates and answer questions through a model fallback chain
//! - Manage the library (list, rename, delete) without leaving stale index data
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `tenant` - Tenant identity and isolation
//! - `jobs` - Job records, progress, cancellation flags and notifications
//! - `media` - Per-tenant media storage and previews
//! - `transcription` - Speech-to-text transcription
//! - `chunking` - Grouping of consecutive transcript segments
//! - `embedding` - Embedding generation
//! - `vector_store` - One collection per video, per tenant
//! - `orchestrator` - Ingestion jobs and library operations
//! - `retrieval` - Federated nearest-neighbour search with context expansion
//! - `rerank` - Candidate reranking
//! - `rag` - Answer generation
//! - `services` - Shared, lazily built collaborators
//!
//! # Example
//!
//! ```rust,no_run
//! use pinpoint::config::Settings;
//! use pinpoint::orchestrator::Orchestrator;
//! use pinpoint::rag::QueryPipeline;
//! use pinpoint::services::Services;
//! use pinpoint::tenant::TenantId;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let services = Arc::new(Services::new(Settings::load()?)?);
//!     let tenant = TenantId::new("alice")?;
//!
//!     let bytes = std::fs::read("Lecture1.mp4")?;
//!     let orchestrator = Orchestrator::new(services.clone());
//!     orchestrator.upload(&tenant, "Lecture1.mp4", &bytes).await?.wait().await;
//!
//!     let pipeline = QueryPipeline::from_services(&services).await?;
//!     let answer = pipeline.ask(&tenant, "What do mitochondria do?").await?;
//!     println!("{}", answer.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod jobs;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod rerank;
pub mod retrieval;
pub mod services;
pub mod tenant;
pub mod transcription;
pub mod vector_store;

pub use error::{PinpointError, Result};
