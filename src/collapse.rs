//! Run-length collapse of repeated line sequences.
//!
//! Lines are compared by their content with any leading timestamp removed,
//! so a burst of identical messages logged at different times still
//! collapses. At each position the engine looks for a block of 1 to 10 lines
//! that repeats back to back and prefers the block length with the most
//! repeats (the shorter block on ties).

use crate::record::SharedRecord;
use regex::Regex;
use std::sync::LazyLock;
use xxhash_rust::xxh3::xxh3_64;

pub const MAX_PATTERN_LENGTH: usize = 10;
pub const DEFAULT_MIN_REPEAT_COUNT: usize = 2;

/// Leading timestamp forms, stripped in this order.
static TIMESTAMP_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d+\s*",
        r"^\[\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?\]\s*",
        r"^\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\s*",
        r"^\[\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\]\s*",
        r"^\d{4}/\d{2}/\d{2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("timestamp prefix regex must compile"))
    .collect()
});

/// Content used for repeat comparison.
pub fn comparison_key(content: &str) -> &str {
    let mut rest = content;
    for re in TIMESTAMP_PREFIXES.iter() {
        if let Some(m) = re.find(rest) {
            rest = &rest[m.end()..];
        }
    }
    rest.trim()
}

/// `repeat_count` back-to-back copies of a `pattern_length`-line block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseGroup<'a> {
    pub pattern_length: usize,
    pub repeat_count: usize,
    /// Every underlying line, `pattern_length * repeat_count` of them.
    pub lines: &'a [SharedRecord],
}

impl<'a> CollapseGroup<'a> {
    /// The block that repeats.
    pub fn pattern(&self) -> &'a [SharedRecord] {
        &self.lines[..self.pattern_length]
    }

    pub fn first_line_number(&self) -> usize {
        self.lines.first().map_or(0, |r| r.line_number)
    }

    pub fn last_line_number(&self) -> usize {
        self.lines.last().map_or(0, |r| r.line_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayRow<'a> {
    Line(&'a SharedRecord),
    Group(CollapseGroup<'a>),
}

impl<'a> DisplayRow<'a> {
    /// Number of underlying lines this row stands for.
    pub fn line_count(&self) -> usize {
        match self {
            DisplayRow::Line(_) => 1,
            DisplayRow::Group(group) => group.lines.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseEngine {
    min_repeat_count: usize,
}

impl Default for CollapseEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REPEAT_COUNT)
    }
}

impl CollapseEngine {
    /// Values below 1 are raised to 1.
    pub fn new(min_repeat_count: usize) -> Self {
        Self {
            min_repeat_count: min_repeat_count.max(1),
        }
    }

    pub fn min_repeat_count(&self) -> usize {
        self.min_repeat_count
    }

    /// Rows for `lines`. Expanding every row gives back `lines` exactly.
    pub fn collapse<'a>(&self, lines: &'a [SharedRecord]) -> Vec<DisplayRow<'a>> {
        let mut rows = Vec::new();
        self.scan(lines, |start, run| match run {
            Some((pattern_length, repeat_count)) => rows.push(DisplayRow::Group(CollapseGroup {
                pattern_length,
                repeat_count,
                lines: &lines[start..start + pattern_length * repeat_count],
            })),
            None => rows.push(DisplayRow::Line(&lines[start])),
        });
        rows
    }

    /// `collapse(lines).len()` without building the rows.
    pub fn display_count(&self, lines: &[SharedRecord]) -> usize {
        let mut count = 0;
        self.scan(lines, |_, _| count += 1);
        count
    }

    /// Walk `lines`, calling `emit(start, Some((length, repeats)))` for each
    /// group and `emit(start, None)` for each single line.
    fn scan<F>(&self, lines: &[SharedRecord], mut emit: F)
    where
        F: FnMut(usize, Option<(usize, usize)>),
    {
        let keys: Vec<(u64, &str)> = lines
            .iter()
            .map(|r| {
                let key = comparison_key(&r.content);
                (xxh3_64(key.as_bytes()), key)
            })
            .collect();
        let n = keys.len();
        let mut i = 0;

        while i < n {
            let mut best: Option<(usize, usize)> = None;
            let max_length = MAX_PATTERN_LENGTH.min((n - i) / 2);

            for length in 1..=max_length {
                let mut repeats = 1;
                let mut next = i + length;
                while next + length <= n && blocks_equal(&keys, i, next, length) {
                    repeats += 1;
                    next += length;
                }
                if repeats >= 2 && best.map_or(true, |(_, r)| repeats > r) {
                    best = Some((length, repeats));
                }
            }

            match best {
                Some((length, repeats)) if repeats >= self.min_repeat_count => {
                    emit(i, Some((length, repeats)));
                    i += length * repeats;
                }
                _ => {
                    emit(i, None);
                    i += 1;
                }
            }
        }
    }
}

fn blocks_equal(keys: &[(u64, &str)], a: usize, b: usize, length: usize) -> bool {
    keys[a..a + length] == keys[b..b + length]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use std::sync::Arc;

    fn records(lines: &[&str]) -> Vec<SharedRecord> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| Arc::new(LogRecord::parse(i + 1, *l)))
            .collect()
    }

    fn expand(rows: &[DisplayRow<'_>]) -> Vec<usize> {
        rows.iter()
            .flat_map(|row| match row {
                DisplayRow::Line(r) => vec![r.line_number],
                DisplayRow::Group(g) => g.lines.iter().map(|r| r.line_number).collect(),
            })
            .collect()
    }

    #[test]
    fn test_comparison_key_strips_timestamps() {
        assert_eq!(comparison_key("2024-01-01 10:00:00.123 INFO ping"), "INFO ping");
        assert_eq!(comparison_key("[2024-01-01 10:00:00] INFO ping"), "INFO ping");
        assert_eq!(comparison_key("2024/01/01 10:00:00 INFO ping "), "INFO ping");
        assert_eq!(comparison_key("  no prefix  "), "no prefix");
    }

    #[test]
    fn test_single_line_repeats_across_timestamps() {
        let lines = records(&[
            "2024-01-01 10:00:00 start",
            "2024-01-01 10:00:01 heartbeat",
            "2024-01-01 10:00:02 heartbeat",
            "2024-01-01 10:00:03 heartbeat",
            "2024-01-01 10:00:04 stop",
        ]);
        let rows = CollapseEngine::default().collapse(&lines);
        assert_eq!(rows.len(), 3);
        match rows[1] {
            DisplayRow::Group(g) => {
                assert_eq!(g.pattern_length, 1);
                assert_eq!(g.repeat_count, 3);
                assert_eq!(g.first_line_number(), 2);
                assert_eq!(g.last_line_number(), 4);
            }
            DisplayRow::Line(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn test_multi_line_pattern() {
        let lines = records(&["a", "b", "a", "b", "a", "b", "c"]);
        let rows = CollapseEngine::default().collapse(&lines);
        assert_eq!(rows.len(), 2);
        match rows[0] {
            DisplayRow::Group(g) => {
                assert_eq!((g.pattern_length, g.repeat_count), (2, 3));
                assert_eq!(g.pattern().len(), 2);
            }
            DisplayRow::Line(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn test_two_line_pattern_five_times_is_one_group() {
        let lines = records(&["a", "b", "a", "b", "a", "b", "a", "b", "a", "b"]);
        let engine = CollapseEngine::default();
        let rows = engine.collapse(&lines);
        assert_eq!(rows.len(), 1);
        assert_eq!(engine.display_count(&lines), 1);
        match rows[0] {
            DisplayRow::Group(g) => {
                assert_eq!((g.pattern_length, g.repeat_count), (2, 5));
                assert_eq!(g.lines.len(), 10);
                assert_eq!((g.first_line_number(), g.last_line_number()), (1, 10));
            }
            DisplayRow::Line(_) => panic!("expected a group"),
        }
        assert_eq!(expand(&rows), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_most_repeats_wins_and_ties_prefer_shorter() {
        // "x" alone repeats 4 times; "xx" repeats only 2 times.
        let lines = records(&["x", "x", "x", "x"]);
        let rows = CollapseEngine::default().collapse(&lines);
        assert_eq!(rows.len(), 1);
        assert!(matches!(
            rows[0],
            DisplayRow::Group(CollapseGroup {
                pattern_length: 1,
                repeat_count: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_min_repeat_count_threshold() {
        let lines = records(&["a", "a", "b", "b", "b"]);
        let rows = CollapseEngine::new(3).collapse(&lines);
        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[0], DisplayRow::Line(_)));
        assert!(matches!(rows[1], DisplayRow::Line(_)));
        assert!(matches!(rows[2], DisplayRow::Group(g) if g.repeat_count == 3));
    }

    #[test]
    fn test_zero_min_repeat_treated_as_one() {
        assert_eq!(CollapseEngine::new(0).min_repeat_count(), 1);
    }

    #[test]
    fn test_expansion_reproduces_input() {
        let lines = records(&["a", "b", "b", "c", "d", "c", "d", "e", "e", "e", "f"]);
        let engine = CollapseEngine::default();
        let rows = engine.collapse(&lines);
        assert_eq!(expand(&rows), (1..=11).collect::<Vec<_>>());
        assert_eq!(engine.display_count(&lines), rows.len());
        assert_eq!(rows.iter().map(|r| r.line_count()).sum::<usize>(), lines.len());
    }

    #[test]
    fn test_no_repeats_is_identity() {
        let lines = records(&["a", "b", "c"]);
        let rows = CollapseEngine::default().collapse(&lines);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| matches!(r, DisplayRow::Line(_))));
        assert!(CollapseEngine::default().collapse(&[]).is_empty());
    }

    #[test]
    fn test_long_run_in_large_input() {
        let mut text: Vec<String> = (0..10_000).map(|i| format!("INFO request {}", i)).collect();
        for line in text.iter_mut().take(55).skip(50) {
            *line = "INFO same message".to_string();
        }
        let refs: Vec<&str> = text.iter().map(String::as_str).collect();
        let lines = records(&refs);
        let rows = CollapseEngine::default().collapse(&lines);

        assert_eq!(rows.len(), 10_000 - 4);
        match rows[50] {
            DisplayRow::Group(g) => {
                assert_eq!((g.pattern_length, g.repeat_count), (1, 5));
                assert_eq!(g.first_line_number(), 51);
            }
            DisplayRow::Line(_) => panic!("expected a group at row 50"),
        }
    }
}
