use crate::error::{Result, ViewerError};
use crate::reader::LineSource;
use crate::record::LogRecord;
use chrono::NaiveDateTime;
use std::time::Duration;

/// In-memory [`LineSource`] for testing.
pub struct MockLineSource {
    pub lines: Vec<String>,
    fail: bool,
    /// Reads starting at or past this 0-based line fail.
    fail_from: Option<usize>,
    read_delay: Duration,
}

impl MockLineSource {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            fail: false,
            fail_from: None,
            read_delay: Duration::ZERO,
        }
    }

    /// `count` lines reading `line 1`, `line 2`, ...
    pub fn numbered(count: usize) -> Self {
        Self::new((1..=count).map(|i| format!("line {}", i)).collect())
    }

    /// A source whose reads always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Range reads from line index `start` onwards fail.
    pub fn failing_from(mut self, start: usize) -> Self {
        self.fail_from = Some(start);
        self
    }

    /// Every range read blocks for `delay` first.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(mock_failure());
        }
        Ok(())
    }
}

fn mock_failure() -> ViewerError {
    ViewerError::io(
        "mock.log",
        std::io::Error::new(std::io::ErrorKind::Other, "mock failure"),
    )
}

impl LineSource for MockLineSource {
    fn total_lines(&self) -> Result<usize> {
        self.check()?;
        Ok(self.lines.len())
    }

    fn read_range(&self, start: usize, count: usize) -> Result<Vec<LogRecord>> {
        self.check()?;
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        if self.fail_from.is_some_and(|from| start >= from) {
            return Err(mock_failure());
        }
        Ok(self
            .lines
            .iter()
            .enumerate()
            .skip(start)
            .take(count)
            .map(|(i, line)| LogRecord::parse(i + 1, line.as_str()))
            .collect())
    }

    fn find_first_at_or_after(&self, target: NaiveDateTime) -> Result<Option<LogRecord>> {
        self.check()?;
        Ok(self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| LogRecord::parse(i + 1, line.as_str()))
            .find(|r| r.timestamp.is_some_and(|ts| ts >= target)))
    }
}
