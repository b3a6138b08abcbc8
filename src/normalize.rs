//! Row and line normalization.
//!
//! Every source record is flattened into a single line of text before
//! embedding: relational/CSV rows become `type=<kind> field=value ...` in
//! source field order, log lines pass through trimmed. Pure functions, no
//! I/O — identical input must produce identical text so embeddings are
//! stable across runs.

use crate::models::RawRow;

/// Source kind for typed rows. The label lands in the normalized text as a
/// `type=` prefix so the corpus stays attributable after flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    History,
    EventHistory,
    WasEvent,
    DbEvent,
}

impl RowKind {
    /// Label used in normalized text.
    pub fn label(self) -> &'static str {
        match self {
            RowKind::History => "history",
            RowKind::EventHistory => "event_history",
            RowKind::WasEvent => "WAS_Event",
            RowKind::DbEvent => "DB_Event",
        }
    }

    /// Table / file name prefix for the partition this kind lives in.
    pub fn partition_prefix(self) -> &'static str {
        match self {
            RowKind::History => "history",
            RowKind::EventHistory => "event_history",
            RowKind::WasEvent => "was_event",
            RowKind::DbEvent => "db_event",
        }
    }

    /// Kinds served by the relational source.
    pub fn relational_kinds() -> [RowKind; 2] {
        [RowKind::History, RowKind::EventHistory]
    }

    /// Kinds served by the CSV export source.
    pub fn csv_kinds() -> [RowKind; 4] {
        [
            RowKind::History,
            RowKind::EventHistory,
            RowKind::WasEvent,
            RowKind::DbEvent,
        ]
    }
}

/// Render a typed row as `type=<kind> f1=v1 f2=v2 ...`.
///
/// Field order is whatever the source defined; missing values render as
/// empty strings rather than failing the row.
pub fn normalize_row(kind: RowKind, row: &RawRow) -> String {
    let mut out = String::with_capacity(16 + row.fields.len() * 16);
    out.push_str("type=");
    out.push_str(kind.label());
    for (name, value) in &row.fields {
        out.push(' ');
        out.push_str(name);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Trim a raw log line; blank lines drop.
pub fn normalize_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_renders_in_field_order() {
        let row = RawRow::from_pairs([("CPU_Usage", "95"), ("Hostname", "svc1")]);
        assert_eq!(
            normalize_row(RowKind::History, &row),
            "type=history CPU_Usage=95 Hostname=svc1"
        );
    }

    #[test]
    fn row_is_deterministic() {
        let row = RawRow::from_pairs([("a", "1"), ("b", "2"), ("c", "3")]);
        let first = normalize_row(RowKind::WasEvent, &row);
        let second = normalize_row(RowKind::WasEvent, &row);
        assert_eq!(first, second);
        assert!(first.starts_with("type=WAS_Event "));
    }

    #[test]
    fn missing_values_render_empty() {
        let row = RawRow::from_pairs([("level", "ERROR"), ("detail", "")]);
        assert_eq!(
            normalize_row(RowKind::DbEvent, &row),
            "type=DB_Event level=ERROR detail="
        );
    }

    #[test]
    fn empty_row_is_just_the_tag() {
        let row = RawRow::default();
        assert_eq!(normalize_row(RowKind::EventHistory, &row), "type=event_history");
    }

    #[test]
    fn lines_trim_and_blank_drops() {
        assert_eq!(normalize_line("  tx latency spike  "), Some("tx latency spike".to_string()));
        assert_eq!(normalize_line("   "), None);
        assert_eq!(normalize_line(""), None);
    }
}
