//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Failures local to one date (ETL) or one request (retrieval) are absorbed
//! at that boundary; only schema bootstrap and permanent provider
//! misconfiguration may abort a run. Absent partitions are not errors at
//! all — connectors return empty results for them.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A relational or vector backend could not be reached, or rejected
    /// the connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An outbound call exceeded its time budget. Treated by callers the
    /// same way as a connection failure.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// An embedding's length does not match the dimension declared at
    /// schema creation. Aborts the current date's write batch.
    #[error("embedding dimension mismatch: got {got}, schema expects {want}")]
    DimensionMismatch { got: usize, want: usize },

    /// `ensure_schema` could not create the extension, table, or index.
    /// Fatal to an ETL run when the vector backend is enabled.
    #[error("schema bootstrap failed: {0}")]
    SchemaBootstrap(String),

    /// A provider response did not match the expected shape (wrong arity,
    /// missing fields, non-numeric values).
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl PipelineError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        PipelineError::Connection(err.to_string())
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Connection(err.to_string())
    }
}
