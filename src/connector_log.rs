//! Flat log-file source.
//!
//! Partitions live at `{base_dir}/{prefix}_{date}`; an absent file is an
//! expected condition in a rolling window and yields an empty result.

use std::path::Path;

use crate::normalize::normalize_line;

/// Read one date partition of a log source as trimmed, non-blank lines.
///
/// Returns `[]` when the partition file does not exist or cannot be read —
/// absent daily partitions are not errors. Non-UTF-8 bytes are replaced
/// rather than failing the file.
pub fn read_partition(base_dir: &Path, prefix: &str, date: &str) -> Vec<String> {
    let path = base_dir.join(format!("{}_{}", prefix, date));

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "log partition absent");
            return Vec::new();
        }
    };

    String::from_utf8_lossy(&bytes)
        .lines()
        .filter_map(normalize_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_trimmed_non_blank_lines() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("middleware_20250101"),
            "  GC pause 1200ms  \n\n   \nthread pool exhausted\n",
        )
        .unwrap();

        let lines = read_partition(tmp.path(), "middleware", "20250101");
        assert_eq!(lines, vec!["GC pause 1200ms", "thread pool exhausted"]);
    }

    #[test]
    fn absent_partition_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_partition(tmp.path(), "db", "19990101").is_empty());
    }

    #[test]
    fn tolerates_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("db_20250102"), b"ok line\n\xff\xfe broken\n").unwrap();

        let lines = read_partition(tmp.path(), "db", "20250102");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok line");
    }
}
