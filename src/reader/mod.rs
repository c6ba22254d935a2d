pub mod extract;
pub mod scanner;

use crate::error::Result;
use crate::record::LogRecord;
use chrono::NaiveDateTime;

pub use scanner::LineScanner;

/// Random-access view of a line-oriented source.
///
/// The background loader and the session only need these three operations,
/// which keeps them testable against an in-memory source.
pub trait LineSource: Send + Sync {
    /// Number of lines in the source.
    fn total_lines(&self) -> Result<usize>;

    /// Up to `count` records starting at 0-based line `start`.
    ///
    /// Returns fewer records (possibly none) when the range runs past the end.
    fn read_range(&self, start: usize, count: usize) -> Result<Vec<LogRecord>>;

    /// First record in file order whose timestamp is `>= target`.
    fn find_first_at_or_after(&self, target: NaiveDateTime) -> Result<Option<LogRecord>>;
}
