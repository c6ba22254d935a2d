//! Config error types for biglog.
//!
//! Provides rich error messages with file locations and typo suggestions.

use super::types::KNOWN_KEYS;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use strsim::jaro_winkler;

const SIMILARITY_THRESHOLD: f64 = 0.8;

static UNKNOWN_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"unknown field `([^`]+)`").expect("unknown-field regex must compile")
});

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"line (\d+)(?:,? column (\d+))?").expect("location regex must compile")
});

/// Error loading or parsing a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading the config file.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parse error.
    Parse {
        path: PathBuf,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
        suggestion: Option<String>,
    },

    /// Validation error (semantic errors after parsing).
    Validation { path: PathBuf, message: String },
}

impl ConfigError {
    /// Build a parse error from a serde-saphyr failure, pulling out the
    /// location and suggesting a known key for an unknown one.
    pub fn from_saphyr_error(path: PathBuf, err: serde_saphyr::Error) -> Self {
        let message = err.to_string();
        let suggestion = UNKNOWN_FIELD
            .captures(&message)
            .and_then(|caps| suggest_key(&caps[1]));
        let (line, column) = match LOCATION.captures(&message) {
            Some(caps) => (
                caps.get(1).and_then(|m| m.as_str().parse().ok()),
                caps.get(2).and_then(|m| m.as_str().parse().ok()),
            ),
            None => (None, None),
        };
        ConfigError::Parse {
            path,
            message,
            line,
            column,
            suggestion,
        }
    }

    /// Format error in Cargo-style format.
    pub fn format_cargo_style(&self) -> String {
        match self {
            ConfigError::Io { path, source } => {
                format!(
                    "error: cannot read config file\n  --> {}\n  |\n  = {}\n",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse {
                path,
                message,
                line,
                column,
                suggestion,
            } => {
                let location = match (line, column) {
                    (Some(l), Some(c)) => format!("{}:{}:{}", path.display(), l, c),
                    (Some(l), None) => format!("{}:{}", path.display(), l),
                    _ => format!("{}", path.display()),
                };
                let mut output = format!("error: {}\n  --> {}\n  |\n", message, location);
                if let Some(suggestion) = suggestion {
                    output.push_str(&format!("  = help: did you mean `{}`?\n", suggestion));
                }
                output
            }
            ConfigError::Validation { path, message } => {
                format!("error: {}\n  --> {}\n  |\n", message, path.display())
            }
        }
    }
}

/// Closest known key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str) -> Option<String> {
    KNOWN_KEYS
        .iter()
        .map(|&known| (known, jaro_winkler(unknown, known)))
        .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(known, _)| known.to_string())
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_cargo_style())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_key_for_typo() {
        assert_eq!(suggest_key("page_sise").as_deref(), Some("page_size"));
        assert_eq!(suggest_key("chunksize").as_deref(), Some("chunk_size"));
        assert_eq!(suggest_key("colour_scheme"), None);
    }

    #[test]
    fn test_parse_error_format_with_location_and_help() {
        let err = ConfigError::Parse {
            path: PathBuf::from("biglog.yaml"),
            message: "unknown field `page_sise`".to_string(),
            line: Some(3),
            column: Some(1),
            suggestion: Some("page_size".to_string()),
        };
        let text = err.format_cargo_style();
        assert!(text.contains("--> biglog.yaml:3:1"));
        assert!(text.contains("did you mean `page_size`?"));
    }

    #[test]
    fn test_validation_format() {
        let err = ConfigError::Validation {
            path: PathBuf::from("/etc/biglog.yaml"),
            message: "page_size must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error: page_size must be at least 1\n  --> /etc/biglog.yaml\n  |\n"
        );
    }
}
