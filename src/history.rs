//! Search history persisted as a JSON array, newest entry last.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DISPLAY_COUNT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedResult {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local wall-clock time, ISO-8601 without offset.
    pub timestamp: NaiveDateTime,
    pub question: String,
    pub query: String,
    pub result: SelectedResult,
}

impl HistoryEntry {
    pub fn now(question: &str, query: &str, result: SelectedResult) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            question: question.to_string(),
            query: query.to_string(),
            result,
        }
    }

    /// `[MM/DD HH:MM] <question prefix>...`
    pub fn summary(&self) -> String {
        let preview: String = self.question.chars().take(50).collect();
        format!("[{}] {preview}...", self.timestamp.format("%m/%d %H:%M"))
    }
}

pub struct History {
    path: PathBuf,
    limit: usize,
    entries: Vec<HistoryEntry>,
}

impl History {
    /// A missing or unreadable file starts an empty history.
    pub fn load(path: impl AsRef<Path>, limit: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt history file");
                Vec::new()
            }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no history loaded");
                Vec::new()
            }
        };
        Self {
            path,
            limit: limit.max(1),
            entries,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let entries = self.entries();
        &entries[entries.len().saturating_sub(n)..]
    }

    /// Append, trim to the limit, and rewrite the file. The entry stays in
    /// memory even when the write fails.
    pub fn record(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.push(entry);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.save()
    }

    fn save(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "history saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("ows-history-{}.json", fastrand::u64(..)))
    }

    fn entry(question: &str) -> HistoryEntry {
        HistoryEntry::now(
            question,
            "query",
            SelectedResult {
                title: "Title".into(),
                url: "https://example.com".into(),
            },
        )
    }

    #[test]
    fn missing_file_is_empty() {
        let history = History::load(temp_path(), 50);
        assert!(history.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let path = temp_path();
        std::fs::write(&path, "[{broken").unwrap();
        let history = History::load(&path, 50);
        std::fs::remove_file(&path).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn record_persists_and_reloads() {
        let path = temp_path();
        let mut history = History::load(&path, 50);
        history.record(entry("What is Rust?")).unwrap();

        let reloaded = History::load(&path, 50);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].question, "What is Rust?");
        assert_eq!(reloaded.entries()[0].result.url, "https://example.com");
    }

    #[test]
    fn record_keeps_only_the_newest_entries() {
        let path = temp_path();
        let mut history = History::load(&path, 3);
        for i in 0..5 {
            history.record(entry(&format!("q{i}"))).unwrap();
        }
        std::fs::remove_file(&path).unwrap();

        let questions: Vec<_> = history.entries().iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn recent_returns_tail() {
        let path = temp_path();
        let mut history = History::load(&path, 50);
        for i in 0..12 {
            history.record(entry(&format!("q{i}"))).unwrap();
        }
        std::fs::remove_file(&path).unwrap();

        let recent = history.recent(DISPLAY_COUNT);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[9].question, "q11");
    }

    #[test]
    fn reads_timestamps_with_microseconds() {
        let json = r#"[{
            "timestamp": "2024-05-01T09:30:15.123456",
            "question": "How do I install Docker on Ubuntu?",
            "query": "install Docker Ubuntu",
            "result": {"title": "Docs", "url": "https://docs.docker.com"}
        }]"#;
        let path = temp_path();
        std::fs::write(&path, json).unwrap();
        let history = History::load(&path, 50);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            history.entries()[0].summary(),
            "[05/01 09:30] How do I install Docker on Ubuntu?..."
        );
    }

    #[test]
    fn summary_cuts_long_questions_at_fifty_chars() {
        let long = "x".repeat(80);
        let summary = entry(&long).summary();
        assert!(summary.ends_with(&format!("{}...", "x".repeat(50))));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = std::env::temp_dir();
        let mut history = History::load(&dir, 50);
        assert!(history.record(entry("q")).is_err());
        assert_eq!(history.entries().len(), 1);
    }
}
