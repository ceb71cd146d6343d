//! Structured JSONL run log for replays.
//!
//! Every record carries the run id, a wall-clock timestamp, a level and an
//! event type. Payloads above `max_payload_bytes` are replaced by a truncated
//! string rendering so a single huge step cannot bloat the log.

use crate::config::LoggingConfig;
use crate::errors::ReplayError;
use crate::log_retention::enforce_total_budget;
use crate::replay::step::InteractionStep;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub run_id: String,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

#[derive(Serialize)]
struct LogRecord<'a> {
    ts_unix_ms: u128,
    run_id: &'a str,
    level: &'a str,
    event_type: &'a str,
    payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            run_id: format!("run-{}", unix_millis()),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    /// `None` when no run log is configured. Relative paths resolve against `base`.
    pub fn from_config(cfg: &LoggingConfig, base: &Path) -> Option<Self> {
        let configured = cfg.run_log.as_ref()?;
        let mut logger = Self::new(base.join(configured));
        logger.max_payload_bytes = cfg.max_payload_bytes;
        logger.budget_bytes = cfg.budget_bytes;
        Some(logger)
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), ReplayError> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            std::fs::create_dir_all(parent).map_err(|e| ReplayError::Io(e.to_string()))?;
        }

        let record = LogRecord {
            ts_unix_ms: unix_millis(),
            run_id: &self.run_id,
            level: event.level,
            event_type: event.event_type,
            payload: truncate_json(event.payload.clone(), self.max_payload_bytes),
        };
        let mut line = serde_json::to_string(&record).map_err(|e| ReplayError::Io(e.to_string()))?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| ReplayError::Io(format!("{}: {e}", self.path.display())))?;

        if let (Some(parent), Some(stem)) = (parent, self.path.file_stem().and_then(|s| s.to_str())) {
            enforce_total_budget(parent, stem, self.budget_bytes, std::slice::from_ref(&self.path))?;
        }
        Ok(())
    }

    /// Append, dropping any failure. Replay never stops over its own log.
    pub fn record(&self, level: &str, event_type: &str, payload: Value) {
        let _ = self.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

/// Identifying fields of a step for run-log payloads.
pub fn step_payload(step: &InteractionStep) -> Value {
    json!({
        "index": step.index,
        "line": step.line,
        "seq": step.seq,
        "event": step.event,
        "action": step.action,
        "testId": step.test_id,
        "identity": step.identity_key(),
    })
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = value.to_string();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{step_payload, JsonlLogger, LogEvent};
    use crate::config::LoggingConfig;
    use crate::replay::step::InteractionStep;
    use serde_json::{json, Value};
    use std::path::Path;

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .expect("read")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn records_carry_run_id_and_truncated_payloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs/replay-run.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 24;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "replay_started",
                payload: json!({"steps": 3}),
            })
            .expect("append");
        logger.record(
            "error",
            "step_failed",
            json!({"error": "no such element: css=[data-testid=\"sql-manager-query-preview-1\"]"}),
        );

        let records = lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["payload"], json!({"steps": 3}));
        assert_eq!(records[0]["run_id"], records[1]["run_id"]);
        let truncated = records[1]["payload"].as_str().expect("string payload");
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 24);
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 12;
        logger.record("info", "step_skipped", json!({"text": "В новый файл"}));

        let records = lines(&path);
        assert!(records[0]["payload"]
            .as_str()
            .expect("string")
            .ends_with("..."));
    }

    #[test]
    fn configured_relative_path_resolves_against_base() {
        let cfg = LoggingConfig {
            run_log: Some("out/run.jsonl".into()),
            max_payload_bytes: 100,
            budget_bytes: 1000,
        };
        let logger = JsonlLogger::from_config(&cfg, Path::new("/work")).expect("configured");
        assert_eq!(logger.path, Path::new("/work/out/run.jsonl"));
        assert_eq!(logger.max_payload_bytes, 100);

        let unset = LoggingConfig {
            run_log: None,
            ..cfg
        };
        assert!(JsonlLogger::from_config(&unset, Path::new("/work")).is_none());
    }

    #[test]
    fn step_payload_carries_position_and_identity() {
        let step = InteractionStep::parse_line(
            r#"{"seq":4,"event":"click","action":"preview","testId":"p-1"}"#,
            2,
            3,
        )
        .expect("step");
        let payload = step_payload(&step);
        assert_eq!(payload["index"], 2);
        assert_eq!(payload["line"], 3);
        assert_eq!(payload["testId"], "p-1");
        assert_eq!(payload["identity"].as_str().map(str::len), Some(64));
    }
}
