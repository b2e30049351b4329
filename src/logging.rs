use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One JSON object per line on stderr.
#[derive(Clone, Debug, Serialize)]
pub struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
    pub time: String,
    pub level: String,
    pub event: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(rename = "move", skip_serializing_if = "Option::is_none")]
    pub move_index: Option<u64>,
    pub details: Value,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogContext<'a> {
    pub scenario: Option<&'a str>,
    pub seed: Option<u64>,
    pub move_index: Option<u64>,
}

pub fn build_log_line(
    level: LogLevel,
    event: &str,
    session_id: &str,
    context: LogContext<'_>,
    details: Value,
) -> StructuredLogLine {
    StructuredLogLine {
        timestamp_ms: now_ms(),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        level: level.as_str().to_string(),
        event: event.to_string(),
        session_id: session_id.to_string(),
        scenario: context.scenario.map(str::to_string),
        seed: context.seed,
        move_index: context.move_index,
        details,
    }
}

pub fn emit_log(
    level: LogLevel,
    event: &str,
    session_id: &str,
    context: LogContext<'_>,
    details: Value,
) {
    let log_line = build_log_line(level, event, session_id, context, details);
    match serde_json::to_string(&log_line) {
        Ok(text) => eprintln!("{text}"),
        Err(err) => eprintln!("[log] failed to serialize {event}: {err}"),
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_line_uses_camel_case_and_skips_empty_context() {
        let line = build_log_line(
            LogLevel::Warn,
            "deadlock_exhausted",
            "sess-1",
            LogContext::default(),
            json!({ "attempts": 100 }),
        );
        let value = serde_json::to_value(&line).expect("log line should serialize");
        assert_eq!(value["level"], "warn");
        assert_eq!(value["sessionId"], "sess-1");
        assert_eq!(value["details"]["attempts"], 100);
        assert!(value.get("scenario").is_none());
        assert!(value.get("seed").is_none());
        assert!(value.get("move").is_none());
    }

    #[test]
    fn log_line_carries_scenario_context() {
        let line = build_log_line(
            LogLevel::Info,
            "move_resolved",
            "sess-2",
            LogContext {
                scenario: Some("quick-check-6x6"),
                seed: Some(7),
                move_index: Some(3),
            },
            Value::Null,
        );
        let value = serde_json::to_value(&line).expect("log line should serialize");
        assert_eq!(value["scenario"], "quick-check-6x6");
        assert_eq!(value["seed"], 7);
        assert_eq!(value["move"], 3);
    }

    #[test]
    fn log_time_is_rfc3339_utc() {
        let line = build_log_line(
            LogLevel::Info,
            "run_started",
            "sess-3",
            LogContext::default(),
            Value::Null,
        );
        assert!(line.time.ends_with('Z'), "time={}", line.time);
        assert!(chrono::DateTime::parse_from_rfc3339(&line.time).is_ok());
        assert!(line.timestamp_ms > 0);
    }
}
