//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One source record before normalization: field name / value pairs in the
/// order the source defines them. Order matters — normalized text must be
/// byte-identical across runs for identical input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawRow {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A stored document as returned by the vector store's similarity query.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: i64,
    pub source: String,
    pub content: String,
    /// `1 - cosine_distance` against the query vector; in `[-1, 1]`,
    /// higher is more similar.
    pub score: f64,
}

/// A ranked answer returned to callers. `score` is cosine similarity on the
/// vector path or an integer keyword-hit count on the fallback path; the two
/// scales never mix within one response.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub source: String,
    pub content: String,
    pub score: f64,
}

/// Request payload for `POST /qa` and the `ask` command.
#[derive(Debug, Clone, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Response payload: `top_k` echoes the clamped value actually used.
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub question: String,
    pub answers: Vec<RetrievalResult>,
    pub top_k: usize,
}

/// Outcome of one date in an ETL window.
#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    /// Documents were written (or sidecar rows, when the store is disabled).
    Loaded { documents: usize },
    /// No enabled source had data for the date. The common case for sparse
    /// historical windows; never an error.
    Skipped,
    /// Embedding or writing failed; subsequent dates still run.
    Failed { reason: String },
}

/// Per-run summary produced by the ETL orchestrator.
#[derive(Debug, Clone)]
pub struct EtlReport {
    pub run_id: String,
    pub dates: Vec<(String, DateOutcome)>,
}

impl EtlReport {
    pub fn loaded_documents(&self) -> usize {
        self.dates
            .iter()
            .map(|(_, o)| match o {
                DateOutcome::Loaded { documents } => *documents,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped_dates(&self) -> usize {
        self.dates
            .iter()
            .filter(|(_, o)| matches!(o, DateOutcome::Skipped))
            .count()
    }

    pub fn failed_dates(&self) -> usize {
        self.dates
            .iter()
            .filter(|(_, o)| matches!(o, DateOutcome::Failed { .. }))
            .count()
    }
}
