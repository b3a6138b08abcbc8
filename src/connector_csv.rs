//! CSV export source (file-based stand-in for the relational tables).
//!
//! Partitions live at `{base_dir}/{kind}_{date}.csv` with a header row.
//! Used when deployments cannot reach the production relational cluster;
//! takes precedence over the relational source when both are enabled.

use std::path::Path;

use crate::models::RawRow;
use crate::normalize::RowKind;

/// Read one date partition of a CSV export as header-keyed rows.
///
/// Returns `[]` for an absent or unreadable file. Rows shorter than the
/// header are padded with empty values; rows longer than the header keep
/// only the named columns.
pub fn read_csv_partition(base_dir: &Path, kind: RowKind, date: &str) -> Vec<RawRow> {
    let path = base_dir.join(format!("{}_{}.csv", kind.partition_prefix(), date));

    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(&path) {
        Ok(reader) => reader,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "csv partition absent");
            return Vec::new();
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(|h| h.trim().to_string()).collect(),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "csv header unreadable");
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            // A torn row should not sink the whole partition.
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "skipping malformed csv row");
                continue;
            }
        };

        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record.get(i).unwrap_or("").trim().to_string();
                (name.clone(), value)
            })
            .collect();
        rows.push(RawRow { fields });
    }

    rows
}
