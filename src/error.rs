//! Error type shared by the scanner, mutator, filter pipeline and session.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Error, Debug)]
pub enum ViewerError {
    /// A user-supplied regular expression failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A user-supplied time string matched none of the accepted formats.
    #[error("cannot parse time '{0}'")]
    UnparsableTime(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ViewerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ViewerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable name used in protocol error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerError::MalformedPattern { .. } => "malformedPattern",
            ViewerError::Io { .. } => "io",
            ViewerError::UnparsableTime(_) => "unparsableTime",
            ViewerError::InvalidArgument(_) => "invalidArgument",
            ViewerError::Cancelled => "cancelled",
        }
    }

    /// Whether the error was caused by bad caller input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ViewerError::Io { .. } | ViewerError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_pattern_message_names_pattern() {
        let source = regex::Regex::new("(unclosed").unwrap_err();
        let err = ViewerError::MalformedPattern {
            pattern: "(unclosed".to_string(),
            source,
        };
        assert!(err.to_string().contains("'(unclosed'"));
        assert_eq!(err.kind(), "malformedPattern");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_error_is_not_client_error() {
        let err = ViewerError::io(
            "/nope/app.log",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nope/app.log"));
        assert!(!err.is_client_error());
    }
}
