//! Derives timestamp, level, thread, class and method from raw line text.
//!
//! Every extractor is pattern based and never fails: a field that does not
//! match any pattern is simply absent. For each field the patterns are tried
//! in a fixed priority order and the first one that matches wins.

use crate::record::Level;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Derived fields of one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    pub timestamp: Option<NaiveDateTime>,
    pub level: Option<Level>,
    pub thread_name: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
}

static TIMESTAMP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 2024-01-01 12:00:00[.mmm], also inside [..]
        r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?)",
        // 2024/01/01 12:00:00[.mmm]
        r"(\d{4}/\d{2}/\d{2}\s+\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?)",
        // 01-01-2024 12:00:00 (day first)
        r"(\d{2}-\d{2}-\d{4}\s+\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?)",
        // 2024-01-01T12:00:00[.mmm]
        r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("timestamp regex must compile"))
    .collect()
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})-(\d{2})-(\d{4})(.*)$").expect("day-first regex must compile")
});

/// A level keyword directly following an `HH:mm:ss` clock.
static LEVEL_AFTER_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d{2}:\d{2}:\d{2}(?:[.,]\d+)?\W+(ERROR|FATAL|SEVERE|WARN|WARNING|INFO|INFORMATION|DEBUG|TRACE|VERBOSE)(?:\s|$)",
    )
    .expect("level regex must compile")
});

/// Fallback patterns, most severe first.
static LEVEL_FALLBACKS: LazyLock<Vec<(Level, Regex)>> = LazyLock::new(|| {
    [
        (Level::Error, "ERROR|FATAL|SEVERE"),
        (Level::Warn, "WARN|WARNING"),
        (Level::Info, "INFO|INFORMATION"),
        (Level::Debug, "DEBUG|TRACE|VERBOSE"),
    ]
    .into_iter()
    .map(|(level, words)| {
        let pattern = format!(r"(?i)\[({words})\]|\b({words})\s");
        (level, Regex::new(&pattern).expect("level regex must compile"))
    })
    .collect()
});

static THREAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([a-zA-Z][a-zA-Z0-9_-]*)\]").expect("thread regex must compile")
});

static CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*)*\.[A-Z][a-zA-Z0-9_]*)\b")
        .expect("class regex must compile")
});

static METHOD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<([a-zA-Z_][a-zA-Z0-9_]*)>",
        r"([a-zA-Z_][a-zA-Z0-9_]*)接口",
        r"\[([a-zA-Z_][a-zA-Z0-9_]*):\d+\]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("method regex must compile"))
    .collect()
});

pub fn extract_fields(line: &str) -> Fields {
    Fields {
        timestamp: extract_timestamp(line),
        level: extract_level(line),
        thread_name: extract_thread(line),
        class_name: extract_class(line),
        method_name: extract_method(line),
    }
}

pub fn extract_timestamp(line: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_PATTERNS.iter().find_map(|re| {
        re.captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_time(m.as_str()))
    })
}

pub fn extract_level(line: &str) -> Option<Level> {
    if let Some(word) = LEVEL_AFTER_CLOCK
        .captures(line)
        .and_then(|caps| caps.get(1))
    {
        return canonical_level(word.as_str());
    }

    LEVEL_FALLBACKS
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(level, _)| *level)
}

/// First bracketed token that starts with a letter and is not a level keyword.
pub fn extract_thread(line: &str) -> Option<String> {
    THREAD
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|token| canonical_level(token).is_none())
        .map(str::to_string)
}

pub fn extract_class(line: &str) -> Option<String> {
    CLASS
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_method(line: &str) -> Option<String> {
    METHOD_PATTERNS.iter().find_map(|re| {
        re.captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Fold a level keyword or one of its aliases into a canonical level.
pub fn canonical_level(word: &str) -> Option<Level> {
    match word.to_ascii_uppercase().as_str() {
        "ERROR" | "FATAL" | "SEVERE" => Some(Level::Error),
        "WARN" | "WARNING" => Some(Level::Warn),
        "INFO" | "INFORMATION" => Some(Level::Info),
        "DEBUG" | "TRACE" | "VERBOSE" => Some(Level::Debug),
        _ => None,
    }
}

/// Parse a timestamp as written in a log line or typed by a user.
///
/// Accepts `-` or `/` date separators, a space or `T` before the clock,
/// optional fractional seconds, optional surrounding brackets, day-first
/// `DD-MM-YYYY` dates and bare `YYYY-MM-DD` dates (midnight).
pub fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let normalized = normalize_time(text);
    if normalized.is_empty() {
        return None;
    }
    parse_normalized(&normalized).or_else(|| {
        let caps = DAY_FIRST.captures(&normalized)?;
        let reordered = format!("{}-{}-{}{}", &caps[3], &caps[2], &caps[1], &caps[4]);
        parse_normalized(&reordered)
    })
}

fn normalize_time(text: &str) -> String {
    let trimmed = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('Z');
    let mut owned = trimmed.replace('/', "-").replace(',', ".");
    if owned.len() > 10 && owned.as_bytes()[10] == b'T' {
        owned.replace_range(10..11, " ");
    }
    owned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_normalized(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
