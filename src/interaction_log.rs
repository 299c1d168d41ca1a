//! Append-only JSONL interaction log, grounded on
//! `request_serializer.py::serialize_request` and `save_jsonl.py::save_interaction`.
//! Per spec.md §6 this checks the last 5 lines for a duplicate
//! `{prompt, response, session_id, mode}` within 5 seconds of the new
//! record's timestamp — the original Python implementation uses a
//! last-3-lines/3-second window; this crate follows the distilled spec's
//! numbers as the binding contract (see DESIGN.md).

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEDUP_WINDOW_LINES: usize = 5;
const DEDUP_WINDOW_SECONDS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: String,
    pub session_id: String,
    pub mode: String,
    pub prompt: String,
    pub snippets: Vec<String>,
    pub response: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InteractionLog { path: path.into() }
    }

    /// Append one interaction, after checking the last [`DEDUP_WINDOW_LINES`]
    /// lines for a same-content record written within
    /// [`DEDUP_WINDOW_SECONDS`]. Best-effort: any I/O failure is swallowed,
    /// per spec.md §7's "log-writing failures are swallowed" propagation
    /// policy, and is only visible via a `tracing::warn!`.
    pub fn record(&self, prompt: &str, snippets: &[String], response: &str, session_id: &str, mode: &str) {
        let now = Utc::now();
        let record = InteractionRecord {
            timestamp: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            session_id: session_id.to_string(),
            mode: mode.to_string(),
            prompt: prompt.to_string(),
            snippets: snippets.to_vec(),
            response: response.to_string(),
            meta: serde_json::Value::Object(Default::default()),
        };

        if self.is_recent_duplicate(&record, now) {
            return;
        }

        if let Err(e) = self.append(&record) {
            tracing::warn!(error = %e, "failed to append interaction log record");
        }
    }

    fn is_recent_duplicate(&self, record: &InteractionRecord, now: DateTime<Utc>) -> bool {
        let Ok(file) = std::fs::File::open(&self.path) else {
            return false;
        };
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .collect();

        for line in lines.iter().rev().take(DEDUP_WINDOW_LINES) {
            let Ok(existing) = serde_json::from_str::<InteractionRecord>(line) else {
                continue;
            };
            if existing.prompt.trim() == record.prompt.trim()
                && existing.response.trim() == record.response.trim()
                && existing.session_id == record.session_id
                && existing.mode == record.mode
            {
                let Ok(existing_time) = DateTime::parse_from_rfc3339(&existing.timestamp) else {
                    continue;
                };
                let diff = (now - existing_time.with_timezone(&Utc)).num_seconds().abs();
                if diff < DEDUP_WINDOW_SECONDS {
                    return true;
                }
            }
        }
        false
    }

    fn append(&self, record: &InteractionRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_persisted_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("log.jsonl"));
        log.record("what is revenue", &["row a".to_string()], "100", "s1", "chat");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let parsed: InteractionRecord = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.prompt, "what is revenue");
        assert!(parsed.timestamp.ends_with('Z'));
    }

    #[test]
    fn immediate_duplicate_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("log.jsonl"));
        log.record("q", &[], "a", "s1", "chat");
        log.record("q", &[], "a", "s1", "chat");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn different_session_id_is_not_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("log.jsonl"));
        log.record("q", &[], "a", "s1", "chat");
        log.record("q", &[], "a", "s2", "chat");

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
