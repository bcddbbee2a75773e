//! Local term-overlap reranker.
//!
//! BM25 over the candidate pool itself: IDF is computed from the documents
//! being ranked, so terms shared by every passage carry little weight. Runs
//! in-process with no model download.

use super::Reranker;
use crate::embedding::tokenize;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// BM25 reranker scoring against the pool being ranked.
#[derive(Debug, Default, Clone)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }

    fn score_pool(query: &str, documents: &[String]) -> Vec<f32> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        let docs: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

        let n = docs.len() as f32;
        let avg_len = (docs.iter().map(|d| d.len()).sum::<usize>() as f32 / n.max(1.0)).max(1.0);

        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                if query_terms.contains(term) {
                    *df.entry(term).or_default() += 1;
                }
            }
        }

        docs.iter()
            .map(|doc| {
                let mut tf: HashMap<&str, usize> = HashMap::new();
                for term in doc {
                    if query_terms.contains(term.as_str()) {
                        *tf.entry(term.as_str()).or_default() += 1;
                    }
                }

                let len_norm = 1.0 - B + B * doc.len() as f32 / avg_len;
                tf.iter()
                    .map(|(term, &count)| {
                        let df = df.get(term).copied().unwrap_or(0) as f32;
                        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                        let count = count as f32;
                        idf * count * (K1 + 1.0) / (count + K1 * len_norm)
                    })
                    .sum()
            })
            .collect()
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        Ok(Self::score_pool(query, documents))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relevant_passage_scores_highest() {
        let docs = vec![
            "the weather today is sunny".to_string(),
            "photosynthesis converts light into chemical energy in plants".to_string(),
            "plants need water".to_string(),
        ];
        let scores = LexicalReranker::new()
            .score("how does photosynthesis work in plants", &docs)
            .await
            .unwrap();

        assert_eq!(scores.len(), 3);
        assert!(scores[1] > scores[2]);
        assert!(scores[2] > scores[0]);
        assert_eq!(scores[0], 0.0);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let scores = LexicalReranker::new().score("anything", &[]).await.unwrap();
        assert!(scores.is_empty());
    }
}
