//! ETL orchestration: the day-by-day ingestion window.
//!
//! One run walks a trailing window of calendar dates, most recent first,
//! and for each date collects rows from every enabled source, normalizes
//! them, batch-embeds the day's texts in one provider call, and appends the
//! resulting documents to the vector store tagged with the date. Per-date
//! failures are isolated: a bad date is recorded and the run moves on.
//! Only schema bootstrap failure aborts a run, and only when the vector
//! backend is enabled.
//!
//! Re-running a window appends duplicate documents — there is no dedup key;
//! the window is meant for a fresh sink or a rolling store that accepts
//! append-with-duplicates.

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use std::io::Write;
use std::sync::Arc;

use crate::config::Config;
use crate::connector_csv::read_csv_partition;
use crate::connector_log::read_partition;
use crate::db;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::models::{DateOutcome, EtlReport};
use crate::normalize::{normalize_row, RowKind};
use crate::relational::RelationalManager;
use crate::store;

/// Dates of the trailing window as `YYYYMMDD` strings, most recent first.
pub fn date_range(days: u32) -> Vec<String> {
    let today = Local::now().date_naive();
    (0..days as i64)
        .map(|i| (today - Duration::days(i)).format("%Y%m%d").to_string())
        .collect()
}

/// Run the full window pass. Returns the per-date report; errors only on
/// unrecoverable setup failure (schema bootstrap with the store enabled).
pub async fn run_etl(config: &Config, embedder: Arc<Embedder>) -> Result<EtlReport> {
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%run_id, days = config.etl.days, "starting etl window");

    let pool = if config.vector.enabled {
        let pool = db::connect(&config.vector)
            .await
            .context("vector store connection failed")?;
        store::ensure_schema(&pool, config.vector.dim)
            .await
            .context("schema bootstrap failed")?;
        Some(pool)
    } else {
        None
    };

    // CSV mode takes precedence over the live relational source.
    let manager = if config.relational.enabled && !config.mock_db.enabled {
        Some(RelationalManager::new(config.relational.clone()))
    } else {
        None
    };
    if let Some(manager) = &manager {
        tracing::debug!(descriptor = %manager.topology().render(), "relational source enabled");
    }

    let mut dates = Vec::new();
    for date in date_range(config.etl.days) {
        let outcome = process_date(config, embedder.as_ref(), manager.as_ref(), pool.as_ref(), &date)
            .await;
        match &outcome {
            DateOutcome::Loaded { documents } => {
                tracing::info!(%date, documents, "date loaded");
            }
            DateOutcome::Skipped => {
                tracing::debug!(%date, "no data in any enabled source");
            }
            DateOutcome::Failed { reason } => {
                tracing::warn!(%date, %reason, "date failed; continuing run");
            }
        }
        dates.push((date, outcome));
    }

    if let Some(pool) = pool {
        pool.close().await;
    }

    let report = EtlReport { run_id, dates };

    println!("etl run {}", report.run_id);
    for (date, outcome) in &report.dates {
        match outcome {
            DateOutcome::Loaded { documents } => println!("  {}: {} documents", date, documents),
            DateOutcome::Skipped => println!("  {}: skipped (no data)", date),
            DateOutcome::Failed { reason } => println!("  {}: failed ({})", date, reason),
        }
    }
    println!(
        "  total: {} documents, {} skipped, {} failed",
        report.loaded_documents(),
        report.skipped_dates(),
        report.failed_dates()
    );
    println!("ok");

    Ok(report)
}

/// One date: collect → normalize → embed → write. Never propagates; every
/// failure folds into the date's outcome.
async fn process_date(
    config: &Config,
    embedder: &Embedder,
    manager: Option<&RelationalManager>,
    pool: Option<&sqlx::PgPool>,
    date: &str,
) -> DateOutcome {
    let texts = collect_texts(config, manager, date).await;
    if texts.is_empty() {
        return DateOutcome::Skipped;
    }

    let vectors = match embedder.embed_texts(&texts).await {
        Ok(vectors) => vectors,
        Err(err) => {
            return DateOutcome::Failed {
                reason: format!("embedding batch failed: {err}"),
            }
        }
    };

    match pool {
        Some(pool) => write_documents(pool, config.vector.dim, date, &texts, &vectors).await,
        None => write_sidecar(config, date, &texts),
    }
}

/// Union of rows from every enabled source for one date, normalized.
/// CSV-export and live-relational collection are mutually exclusive; log
/// sources are additive.
async fn collect_texts(
    config: &Config,
    manager: Option<&RelationalManager>,
    date: &str,
) -> Vec<String> {
    let mut texts = Vec::new();

    if config.mock_db.enabled {
        for kind in RowKind::csv_kinds() {
            for row in read_csv_partition(&config.mock_db.dir, kind, date) {
                texts.push(normalize_row(kind, &row));
            }
        }
    } else if let Some(manager) = manager {
        for kind in RowKind::relational_kinds() {
            for row in manager.fetch_rows_by_date(kind.partition_prefix(), date).await {
                texts.push(normalize_row(kind, &row));
            }
        }
    }

    if config.logs.was_enabled {
        texts.extend(read_partition(&config.logs.was_dir, "middleware", date));
    }
    if config.logs.db_enabled {
        texts.extend(read_partition(&config.logs.db_dir, "db", date));
    }

    texts
}

/// Append the date's documents to the store. A dimension mismatch aborts
/// the remainder of this date's batch — a corrupt vector must not land —
/// but not the run.
async fn write_documents(
    pool: &sqlx::PgPool,
    dim: usize,
    date: &str,
    texts: &[String],
    vectors: &[Vec<f32>],
) -> DateOutcome {
    let mut written = 0usize;
    for (text, vector) in texts.iter().zip(vectors.iter()) {
        match store::insert_document(pool, dim, date, text, vector).await {
            Ok(()) => written += 1,
            Err(err @ PipelineError::DimensionMismatch { .. }) => {
                return DateOutcome::Failed {
                    reason: format!("{err} after {written} documents; batch aborted"),
                };
            }
            Err(err) => {
                return DateOutcome::Failed {
                    reason: format!("write failed after {written} documents: {err}"),
                };
            }
        }
    }
    DateOutcome::Loaded { documents: written }
}

/// Store-disabled runs still collect, normalize, and embed, then persist a
/// sidecar record per row with an absent-embedding marker so dry runs stay
/// observable.
fn write_sidecar(config: &Config, date: &str, texts: &[String]) -> DateOutcome {
    let dir = &config.etl.offline_dir;
    if let Err(err) = std::fs::create_dir_all(dir) {
        return DateOutcome::Failed {
            reason: format!("cannot create offline dir {}: {err}", dir.display()),
        };
    }

    let path = dir.join(format!("documents_{}.jsonl", date));
    let file = match std::fs::File::create(&path) {
        Ok(file) => file,
        Err(err) => {
            return DateOutcome::Failed {
                reason: format!("cannot write sidecar {}: {err}", path.display()),
            }
        }
    };

    let mut writer = std::io::BufWriter::new(file);
    for text in texts {
        let record = serde_json::json!({
            "source": date,
            "content": text,
            "embedding": serde_json::Value::Null,
        });
        if let Err(err) = writeln!(writer, "{}", record) {
            return DateOutcome::Failed {
                reason: format!("sidecar write failed: {err}"),
            };
        }
    }
    if let Err(err) = writer.flush() {
        return DateOutcome::Failed {
            reason: format!("sidecar flush failed: {err}"),
        };
    }

    DateOutcome::Loaded {
        documents: texts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn offline_config(mock_dir: &std::path::Path, offline_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.mock_db.enabled = true;
        config.mock_db.dir = mock_dir.to_path_buf();
        config.etl.offline_dir = offline_dir.to_path_buf();
        config.etl.days = 2;
        config.embedding.dims = 32;
        config
    }

    #[test]
    fn window_is_most_recent_first() {
        let dates = date_range(7);
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], Local::now().date_naive().format("%Y%m%d").to_string());
        for pair in dates.windows(2) {
            assert!(pair[0] > pair[1], "window must descend: {:?}", pair);
        }
        assert_eq!(dates[0].len(), 8);
    }

    #[tokio::test]
    async fn empty_sources_skip_every_date() {
        let mock = TempDir::new().unwrap();
        let offline = TempDir::new().unwrap();
        let config = offline_config(mock.path(), offline.path());
        let embedder = Arc::new(Embedder::new(config.embedding.clone()));

        let report = run_etl(&config, embedder).await.unwrap();

        assert_eq!(report.skipped_dates(), 2);
        assert_eq!(report.loaded_documents(), 0);
        // Skipped dates must not leave sidecar files behind.
        assert_eq!(fs::read_dir(offline.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn store_disabled_run_writes_sidecar_markers() {
        let mock = TempDir::new().unwrap();
        let offline = TempDir::new().unwrap();
        let today = Local::now().date_naive().format("%Y%m%d").to_string();
        fs::write(
            mock.path().join(format!("history_{}.csv", today)),
            "CPU_Usage,Hostname\n95,svc1\n12,svc2\n",
        )
        .unwrap();

        let config = offline_config(mock.path(), offline.path());
        let embedder = Arc::new(Embedder::new(config.embedding.clone()));

        let report = run_etl(&config, embedder).await.unwrap();
        assert_eq!(report.loaded_documents(), 2);
        assert_eq!(report.failed_dates(), 0);

        let sidecar =
            fs::read_to_string(offline.path().join(format!("documents_{}.jsonl", today))).unwrap();
        let lines: Vec<&str> = sidecar.lines().collect();
        assert_eq!(lines.len(), 2);

        let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(row["source"], today.as_str());
        assert!(row["embedding"].is_null());
        assert!(row["content"]
            .as_str()
            .unwrap()
            .starts_with("type=history CPU_Usage=95"));
    }

    #[tokio::test]
    async fn log_sources_are_additive_to_csv_mode() {
        let mock = TempDir::new().unwrap();
        let was_logs = TempDir::new().unwrap();
        let today = Local::now().date_naive().format("%Y%m%d").to_string();

        fs::write(
            mock.path().join(format!("db_event_{}.csv", today)),
            "event,severity\nlock wait,HIGH\n",
        )
        .unwrap();
        fs::write(
            was_logs.path().join(format!("middleware_{}", today)),
            "thread pool exhausted\n\n",
        )
        .unwrap();

        let offline = TempDir::new().unwrap();
        let mut config = offline_config(mock.path(), offline.path());
        config.logs.was_enabled = true;
        config.logs.was_dir = was_logs.path().to_path_buf();

        let texts = collect_texts(&config, None, &today).await;
        assert_eq!(
            texts,
            vec![
                "type=DB_Event event=lock wait severity=HIGH".to_string(),
                "thread pool exhausted".to_string(),
            ]
        );
    }
}
