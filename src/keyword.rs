//! Keyword fallback ranker.
//!
//! The degraded retrieval tier: when the vector path is disabled or
//! failing, questions are answered by scanning a bounded window of recent
//! source files and counting keyword hits per line. This path never raises
//! — an unreadable candidate file is skipped, an empty directory yields an
//! empty result set.

use globset::Glob;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::models::RetrievalResult;

/// Recognized source-file patterns in the fallback window.
const SOURCE_PATTERNS: [&str; 6] = [
    "history_*.csv",
    "event_history_*.csv",
    "was_event_*.csv",
    "db_event_*.csv",
    "history_*.txt",
    "event_history_*.txt",
];

/// At most this many most-recently-modified files are scanned per pattern.
const RECENT_FILES_PER_PATTERN: usize = 7;

/// Rank lines from the recent-file window by keyword hits.
///
/// Tokenizes the question on whitespace and punctuation, drops tokens
/// shorter than two characters, scores each candidate line by the number of
/// distinct tokens it contains (case-insensitive), discards zero-score
/// lines, and returns the top `top_k` by descending score.
pub fn search(base_dir: &Path, question: &str, top_k: usize) -> Vec<RetrievalResult> {
    let tokens = tokenize(question);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(String, usize)> = Vec::new();
    for path in candidate_files(base_dir) {
        let Some(lines) = read_candidate(&path) else {
            continue;
        };
        for line in lines {
            let score = line_score(&line, &tokens);
            if score > 0 {
                scored.push((line, score));
            }
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(content, score)| RetrievalResult {
            id: None,
            source: "mock".to_string(),
            content,
            score: score as f64,
        })
        .collect()
}

/// Question tokens: split on whitespace and punctuation, keep tokens of at
/// least two characters, deduplicated case-insensitively.
pub fn tokenize(question: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in question.split(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '-' | '_' | '/')
    }) {
        if raw.chars().count() < 2 {
            continue;
        }
        let lowered = raw.to_lowercase();
        if !tokens.contains(&lowered) {
            tokens.push(lowered);
        }
    }
    tokens
}

/// Count of distinct tokens appearing in the line, case-insensitive.
fn line_score(line: &str, lowered_tokens: &[String]) -> usize {
    let lowered = line.to_lowercase();
    lowered_tokens
        .iter()
        .filter(|t| lowered.contains(t.as_str()))
        .count()
}

/// The bounded recent-file window: per pattern, the most recently modified
/// files first, capped at [`RECENT_FILES_PER_PATTERN`].
fn candidate_files(base_dir: &Path) -> Vec<PathBuf> {
    let entries: Vec<(String, SystemTime, PathBuf)> = match std::fs::read_dir(base_dir) {
        Ok(read_dir) => read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if !entry.file_type().ok()?.is_file() {
                    return None;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((name, modified, entry.path()))
            })
            .collect(),
        Err(err) => {
            tracing::debug!(dir = %base_dir.display(), %err, "fallback window unavailable");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for pattern in SOURCE_PATTERNS {
        let Ok(glob) = Glob::new(pattern) else {
            continue;
        };
        let matcher = glob.compile_matcher();

        let mut matched: Vec<&(String, SystemTime, PathBuf)> = entries
            .iter()
            .filter(|(name, _, _)| matcher.is_match(name))
            .collect();
        matched.sort_by(|a, b| b.1.cmp(&a.1));

        files.extend(
            matched
                .into_iter()
                .take(RECENT_FILES_PER_PATTERN)
                .map(|(_, _, path)| path.clone()),
        );
    }
    files
}

/// Read one candidate file as trimmed non-blank lines; `None` when the file
/// cannot be read (skipped, never raised).
fn read_candidate(path: &Path) -> Option<Vec<String>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "skipping unreadable candidate");
            return None;
        }
    };

    Some(
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
