//! Contiguous in-memory window over the file's lines.

use crate::record::{LogRecord, SharedRecord};
use std::sync::Arc;

/// Result of handing a chunk to [`FileWindow::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The chunk continued the window.
    Appended { count: usize },
    /// The chunk did not start where the window ends; the window now holds
    /// only the chunk.
    Rebased {
        expected: usize,
        actual: usize,
        discarded: usize,
    },
}

/// Lines `base_offset .. base_offset + len()` of the file, in order.
///
/// The window is always a single gap-free run: record `i` has line number
/// `base_offset + i + 1`.
#[derive(Debug, Clone, Default)]
pub struct FileWindow {
    base_offset: usize,
    records: Vec<SharedRecord>,
}

impl FileWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(base_offset: usize, records: Vec<LogRecord>) -> Self {
        let mut window = Self {
            base_offset,
            records: Vec::new(),
        };
        window.push_all(records);
        window
    }

    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 0-based index of the line after the last buffered one.
    pub fn end(&self) -> usize {
        self.base_offset + self.records.len()
    }

    pub fn records(&self) -> &[SharedRecord] {
        &self.records
    }

    /// Accept a chunk that starts at 0-based line `start`.
    pub fn deliver(&mut self, start: usize, records: Vec<LogRecord>) -> Delivery {
        let expected = self.end();
        if start == expected {
            let count = records.len();
            self.push_all(records);
            return Delivery::Appended { count };
        }

        let discarded = self.records.len();
        log::warn!(
            "chunk starts at line {} but window ends at {}; rebasing ({} records dropped)",
            start,
            expected,
            discarded
        );
        self.replace(start, records);
        Delivery::Rebased {
            expected,
            actual: start,
            discarded,
        }
    }

    /// Drop everything and hold `records` starting at `start`.
    pub fn replace(&mut self, start: usize, records: Vec<LogRecord>) {
        self.base_offset = start;
        self.records.clear();
        self.push_all(records);
    }

    pub fn clear(&mut self) {
        self.replace(0, Vec::new());
    }

    fn push_all(&mut self, records: Vec<LogRecord>) {
        self.records.reserve(records.len());
        for record in records {
            debug_assert_eq!(record.line_number, self.end() + 1);
            self.records.push(Arc::new(record));
        }
    }

    pub fn contains_line(&self, line_number: usize) -> bool {
        line_number > self.base_offset && line_number <= self.end()
    }

    pub fn get_line(&self, line_number: usize) -> Option<&SharedRecord> {
        if !self.contains_line(line_number) {
            return None;
        }
        self.records.get(line_number - self.base_offset - 1)
    }

    /// True when the window covers the whole file of `total_lines` lines.
    pub fn covers_file(&self, total_lines: usize) -> bool {
        self.base_offset == 0 && self.records.len() >= total_lines
    }
}
