//! Vector document store: schema bootstrap, append-only inserts, and
//! cosine similarity search over pgvector.
//!
//! The document table is append-only in normal operation — documents are
//! created only by the ETL write path, never updated in place.

use sqlx::{PgPool, Row};

use crate::error::PipelineError;
use crate::models::ScoredDocument;

/// Create the vector extension, document table, and cosine index if absent.
///
/// Safe to call repeatedly or concurrently: every statement checks
/// existence before creating. Failures map to `SchemaBootstrap`, which is
/// fatal to an ETL run when the vector backend is enabled.
pub async fn ensure_schema(pool: &PgPool, dim: usize) -> Result<(), PipelineError> {
    let statements = [
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS documents (\
               id BIGSERIAL PRIMARY KEY, \
               source TEXT NOT NULL, \
               content TEXT NOT NULL, \
               created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
               embedding vector({})\
             )",
            dim
        ),
        "CREATE INDEX IF NOT EXISTS idx_documents_embedding \
         ON documents USING ivfflat (embedding vector_cosine_ops)"
            .to_string(),
    ];

    for sql in &statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|err| PipelineError::SchemaBootstrap(err.to_string()))?;
    }

    Ok(())
}

/// Append one document. The embedding length must match the dimension
/// declared at schema creation; a mismatch is rejected before touching the
/// wire so a corrupt vector never lands in the table.
pub async fn insert_document(
    pool: &PgPool,
    dim: usize,
    source: &str,
    content: &str,
    embedding: &[f32],
) -> Result<(), PipelineError> {
    check_dimension(embedding.len(), dim)?;

    sqlx::query("INSERT INTO documents (source, content, embedding) VALUES ($1, $2, $3::vector)")
        .bind(source)
        .bind(content)
        .bind(vector_literal(embedding))
        .execute(pool)
        .await?;

    Ok(())
}

/// Up to `top_k` documents nearest to `query_vec`, nearest first.
///
/// Ordering uses the distance operator and the reported score is
/// `1 - cosine_distance` — two independent passes over the same cosine
/// metric, so rank order and score always agree.
pub async fn search_similar(
    pool: &PgPool,
    query_vec: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredDocument>, PipelineError> {
    let literal = vector_literal(query_vec);

    let rows = sqlx::query(
        "SELECT id, source, content, 1 - (embedding <=> $1::vector) AS score \
         FROM documents ORDER BY embedding <-> $1::vector LIMIT $2",
    )
    .bind(&literal)
    .bind(top_k as i64)
    .fetch_all(pool)
    .await?;

    let docs = rows
        .iter()
        .map(|row| ScoredDocument {
            id: row.get("id"),
            source: row.get("source"),
            content: row.get("content"),
            score: row.get("score"),
        })
        .collect();

    Ok(docs)
}

pub fn check_dimension(got: usize, want: usize) -> Result<(), PipelineError> {
    if got != want {
        return Err(PipelineError::DimensionMismatch { got, want });
    }
    Ok(())
}

/// Render a vector as the `[v1,v2,...]` literal pgvector accepts.
pub fn vector_literal(vec: &[f32]) -> String {
    let mut out = String::with_capacity(2 + vec.len() * 10);
    out.push('[');
    for (i, v) in vec.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{:.6}", v));
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_formats_six_decimals() {
        assert_eq!(vector_literal(&[1.0, -0.5]), "[1.000000,-0.500000]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn dimension_check() {
        assert!(check_dimension(768, 768).is_ok());
        let err = check_dimension(384, 768).unwrap_err();
        match err {
            PipelineError::DimensionMismatch { got, want } => {
                assert_eq!((got, want), (384, 768));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
