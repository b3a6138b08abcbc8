//! Two-tier retrieval service.
//!
//! Tier one embeds the question and queries the vector store; tier two is
//! the keyword ranker over the recent-file window. The vector attempt
//! reports a structured outcome — `Hit` or `Degraded` — and the service
//! branches on it, so degradation is an inspected value rather than a
//! caught exception. The tiers are mutually exclusive per call and never
//! mix result sets; callers always get a (possibly empty) ranked list,
//! never an error.

use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::Embedder;
use crate::keyword;
use crate::models::{QaResponse, RetrievalResult};
use crate::store;

/// Bounds applied to every requested `top_k`.
const TOP_K_MIN: usize = 1;
const TOP_K_MAX: usize = 50;

pub fn clamp_top_k(requested: usize) -> usize {
    requested.clamp(TOP_K_MIN, TOP_K_MAX)
}

/// Outcome of the vector tier. `Degraded` carries the reason for the log
/// line; the caller falls back to the keyword tier on it.
enum VectorOutcome {
    Hit(Vec<RetrievalResult>),
    Degraded(String),
}

pub struct Retriever {
    config: Arc<Config>,
    embedder: Arc<Embedder>,
}

impl Retriever {
    pub fn new(config: Arc<Config>, embedder: Arc<Embedder>) -> Self {
        Retriever { config, embedder }
    }

    /// Answer a question with up to `top_k` ranked results.
    ///
    /// An empty (or whitespace-only) question returns an empty result set
    /// without touching any backend. `top_k` is clamped to `[1, 50]` and
    /// the clamped value is echoed in the response.
    pub async fn retrieve(&self, question: &str, top_k: Option<usize>) -> QaResponse {
        let requested = top_k.unwrap_or(self.config.retrieval.default_top_k);
        let top_k = clamp_top_k(requested);

        let trimmed = question.trim();
        if trimmed.is_empty() {
            return QaResponse {
                question: question.to_string(),
                answers: Vec::new(),
                top_k,
            };
        }

        let answers = if self.config.vector.enabled {
            match self.vector_lookup(trimmed, top_k).await {
                VectorOutcome::Hit(results) => results,
                VectorOutcome::Degraded(reason) => {
                    tracing::warn!(%reason, "vector path degraded; answering from keyword tier");
                    keyword::search(&self.config.mock_db.dir, trimmed, top_k)
                }
            }
        } else {
            keyword::search(&self.config.mock_db.dir, trimmed, top_k)
        };

        QaResponse {
            question: question.to_string(),
            answers,
            top_k,
        }
    }

    /// Attempt the vector tier: embed, connect, search. Every failure mode
    /// folds into `Degraded` — embedding errors, store unavailability,
    /// timeouts, malformed responses.
    async fn vector_lookup(&self, question: &str, top_k: usize) -> VectorOutcome {
        let query_vec = match self.embedder.embed_query(question).await {
            Ok(vec) => vec,
            Err(err) => return VectorOutcome::Degraded(format!("question embedding failed: {err}")),
        };

        let pool = match db::connect(&self.config.vector).await {
            Ok(pool) => pool,
            Err(err) => return VectorOutcome::Degraded(format!("vector store unreachable: {err}")),
        };

        let outcome = match store::search_similar(&pool, &query_vec, top_k).await {
            Ok(docs) => VectorOutcome::Hit(
                docs.into_iter()
                    .map(|doc| RetrievalResult {
                        id: Some(doc.id),
                        source: doc.source,
                        content: doc.content,
                        score: doc.score,
                    })
                    .collect(),
            ),
            Err(err) => VectorOutcome::Degraded(format!("similarity query failed: {err}")),
        };

        pool.close().await;
        outcome
    }
}
