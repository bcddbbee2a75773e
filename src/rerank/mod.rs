//! Candidate reranking.
//!
//! Nearest-neighbour distance is a coarse signal. A reranker scores each
//! (query, passage) pair jointly and the pool is reordered by that score,
//! highest first.

mod lexical;
mod remote;

pub use lexical::LexicalReranker;
pub use remote::RemoteReranker;

use crate::error::{PinpointError, Result};
use crate::retrieval::{sort_by_distance, Candidate};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// Scores documents for relevance to a query. Higher is more relevant.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per document, in input order.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Rerank a candidate pool and keep the `top_n` best.
///
/// Candidates are scored on their expanded text and stably sorted by
/// descending score. If scoring fails the pool is ordered by ascending
/// distance instead; the two orderings are never combined.
#[instrument(skip(reranker, query, candidates), fields(reranker = reranker.name(), pool = candidates.len()))]
pub async fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    mut candidates: Vec<Candidate>,
    top_n: usize,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let documents: Vec<String> = candidates.iter().map(|c| c.expanded_text.clone()).collect();
    let scored = reranker.score(query, &documents).await.and_then(|scores| {
        if scores.len() == documents.len() {
            Ok(scores)
        } else {
            Err(PinpointError::Rerank(format!(
                "expected {} scores, got {}",
                documents.len(),
                scores.len()
            )))
        }
    });

    match scored {
        Ok(scores) => {
            for (candidate, score) in candidates.iter_mut().zip(scores) {
                candidate.rerank_score = Some(score);
            }
            candidates.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Err(e) => {
            warn!("Rerank failed, keeping distance order: {}", e);
            for candidate in candidates.iter_mut() {
                candidate.rerank_score = None;
            }
            sort_by_distance(&mut candidates);
        }
    }

    candidates.truncate(top_n);
    debug!("Kept {} candidates", candidates.len());
    candidates
}
