//! The parsed form of a single log line.

use crate::reader::extract;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Label used for records whose severity could not be determined.
pub const OTHER_LEVEL: &str = "OTHER";

/// Canonical severity of a log line.
///
/// Aliases found in log text (FATAL, SEVERE, WARNING, TRACE, ...) are folded
/// into these four during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Error, Level::Warn, Level::Info, Level::Debug];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    /// Parse a canonical level name, ignoring case.
    pub fn from_name(name: &str) -> Option<Level> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Some(Level::Error),
            "WARN" => Some(Level::Warn),
            "INFO" => Some(Level::Info),
            "DEBUG" => Some(Level::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the file with its derived fields.
///
/// Derived fields are computed once from `content` when the record is built
/// and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// 1-based position in the file.
    pub line_number: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

/// Records are shared between the window, filtered views and background tasks.
pub type SharedRecord = Arc<LogRecord>;

impl LogRecord {
    pub fn parse(line_number: usize, content: impl Into<String>) -> Self {
        let content = content.into();
        let fields = extract::extract_fields(&content);
        Self {
            line_number,
            timestamp: fields.timestamp,
            level: fields.level,
            thread_name: fields.thread_name,
            class_name: fields.class_name,
            method_name: fields.method_name,
            content,
        }
    }

    /// Level name for grouping, `OTHER` when no level was found.
    pub fn level_label(&self) -> &'static str {
        self.level.map(Level::as_str).unwrap_or(OTHER_LEVEL)
    }

    /// 0-based position in the file.
    pub fn index(&self) -> usize {
        self.line_number.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fills_derived_fields() {
        let record = LogRecord::parse(
            7,
            "2024-03-01 10:15:30 ERROR [worker-3] com.example.OrderService <placeOrder> failed",
        );
        assert_eq!(record.line_number, 7);
        assert_eq!(record.index(), 6);
        assert_eq!(record.level, Some(Level::Error));
        assert_eq!(record.thread_name.as_deref(), Some("worker-3"));
        assert_eq!(record.class_name.as_deref(), Some("com.example.OrderService"));
        assert_eq!(record.method_name.as_deref(), Some("placeOrder"));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn test_level_label_defaults_to_other() {
        let record = LogRecord::parse(1, "plain text without a level");
        assert_eq!(record.level, None);
        assert_eq!(record.level_label(), OTHER_LEVEL);
    }

    #[test]
    fn test_level_from_name_ignores_case() {
        assert_eq!(Level::from_name("warn"), Some(Level::Warn));
        assert_eq!(Level::from_name(" Debug "), Some(Level::Debug));
        assert_eq!(Level::from_name("other"), None);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_missing_fields() {
        let record = LogRecord::parse(3, "no fields here");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lineNumber"], 3);
        assert!(json.get("timestamp").is_none());
        assert!(json.get("threadName").is_none());
    }
}
