//! Streaming, stateless line scanner over a log file.
//!
//! Every operation reopens the file and makes a single forward pass, so memory
//! stays bounded by the size of the result rather than the size of the file.

use super::extract;
use super::LineSource;
use crate::error::{Result, ViewerError};
use crate::filter::condition::{CompiledConditions, ConditionSet};
use crate::filter::state::{KeywordMode, LevelSelection};
use crate::filter::keyword_filter;
use crate::mutate::KeepRule;
use crate::record::LogRecord;
use crate::stats::timeline::{self, TimelineData, TimelineSample};
use crate::stats::StatisticsSnapshot;
use chrono::NaiveDateTime;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct LineScanner {
    path: PathBuf,
}

impl LineScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a scanner after checking that `path` is a readable regular file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| ViewerError::io(&path, e))?;
        if !meta.is_file() {
            return Err(ViewerError::InvalidArgument(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn file_size(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| ViewerError::io(&self.path, e))
    }

    fn open_file(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| ViewerError::io(&self.path, e))
    }

    /// Visit every line as raw bytes with its 0-based index.
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped. The visitor can stop the
    /// pass early by returning `ControlFlow::Break`.
    pub(crate) fn for_each_raw_line<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &[u8]) -> Result<ControlFlow<()>>,
    {
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, self.open_file()?);
        let mut buf = Vec::with_capacity(256);
        let mut index = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| ViewerError::io(&self.path, e))?;
            if read == 0 {
                break;
            }
            if visit(index, trim_line_ending(&buf))?.is_break() {
                break;
            }
            index += 1;
        }

        Ok(())
    }

    /// Visit every line as text. Invalid UTF-8 is replaced, never rejected.
    fn for_each_line<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &str) -> ControlFlow<()>,
    {
        self.for_each_raw_line(|index, bytes| {
            let text: Cow<'_, str> = String::from_utf8_lossy(bytes);
            Ok(visit(index, &text))
        })
    }

    /// Count lines without decoding them.
    ///
    /// A final line without a trailing newline still counts.
    pub fn total_lines(&self) -> Result<usize> {
        let mut file = self.open_file()?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut count = 0;
        let mut last_byte = None;

        loop {
            let read = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ViewerError::io(&self.path, e)),
            };
            count += memchr::memchr_iter(b'\n', &buf[..read]).count();
            last_byte = Some(buf[read - 1]);
        }

        if matches!(last_byte, Some(b) if b != b'\n') {
            count += 1;
        }
        Ok(count)
    }

    /// Records for 0-based lines `start..start + count`, clipped to the file.
    pub fn read_range(&self, start: usize, count: usize) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        if count == 0 {
            return Ok(records);
        }
        let end = start.saturating_add(count);

        self.for_each_line(|index, line| {
            if index >= start {
                records.push(LogRecord::parse(index + 1, line));
            }
            if index + 1 >= end {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(records)
    }

    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        self.collect_where(|_, _| true)
    }

    fn collect_where<P>(&self, mut keep: P) -> Result<Vec<LogRecord>>
    where
        P: FnMut(usize, &str) -> bool,
    {
        let mut records = Vec::new();
        self.for_each_line(|index, line| {
            if keep(index, line) {
                records.push(LogRecord::parse(index + 1, line));
            }
            ControlFlow::Continue(())
        })?;
        Ok(records)
    }

    /// Records whose content matches `keyword` under `mode`, or with `reverse`,
    /// the records that do not match.
    pub fn search(&self, keyword: &str, mode: KeywordMode, reverse: bool) -> Result<Vec<LogRecord>> {
        if keyword.trim().is_empty() {
            return Err(ViewerError::InvalidArgument(
                "search keyword must not be empty".to_string(),
            ));
        }
        let filter = keyword_filter(keyword, mode)?;
        let results = self.collect_where(|_, line| filter.matches(line) != reverse)?;
        log::debug!(
            "search '{}' ({:?}, reverse={}) matched {} lines in {}",
            keyword,
            mode,
            reverse,
            results.len(),
            self.path.display()
        );
        Ok(results)
    }

    /// Records whose level is in `levels`. An empty selection returns every record.
    pub fn filter_by_level(&self, levels: &LevelSelection) -> Result<Vec<LogRecord>> {
        self.collect_where(|_, line| {
            let label = extract::extract_level(line)
                .map(|l| l.as_str())
                .unwrap_or(crate::record::OTHER_LEVEL);
            levels.admits_label(label)
        })
    }

    /// Records passing the advanced search `set`.
    ///
    /// At least one active condition is required.
    pub fn advanced_search(&self, set: &ConditionSet) -> Result<Vec<LogRecord>> {
        let Some(compiled) = CompiledConditions::compile(set)? else {
            return Err(ViewerError::InvalidArgument(
                "advanced search needs at least one condition".to_string(),
            ));
        };
        let mut records = Vec::new();
        self.for_each_line(|index, line| {
            let record = LogRecord::parse(index + 1, line);
            if compiled.matches(&record) {
                records.push(record);
            }
            ControlFlow::Continue(())
        })?;
        log::debug!(
            "advanced search ({:?}) matched {} lines in {}",
            set.join,
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    /// Preview a deletion: with `keep` the records that would survive, otherwise
    /// the records that would be removed.
    pub fn preview(&self, rule: &KeepRule, keep: bool) -> Result<Vec<LogRecord>> {
        self.collect_where(|index, line| rule.keeps(index + 1, line) == keep)
    }

    pub fn find_first_at_or_after(&self, target: NaiveDateTime) -> Result<Option<LogRecord>> {
        let mut found = None;
        self.for_each_line(|index, line| match extract::extract_timestamp(line) {
            Some(ts) if ts >= target => {
                found = Some(LogRecord::parse(index + 1, line));
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        })?;
        Ok(found)
    }

    /// Full-file statistics in one pass.
    pub fn statistics(&self) -> Result<StatisticsSnapshot> {
        let mut snapshot = StatisticsSnapshot::default();
        self.for_each_line(|index, line| {
            snapshot.absorb(&LogRecord::parse(index + 1, line));
            ControlFlow::Continue(())
        })?;
        Ok(snapshot)
    }

    /// Up to `sample_count` timestamped records spread uniformly by position.
    ///
    /// The first pass counts timestamped lines and the overall time range, the
    /// second picks the samples.
    pub fn sample_timeline(&self, sample_count: usize) -> Result<TimelineData> {
        let mut stamped = 0usize;
        let mut range: Option<(NaiveDateTime, NaiveDateTime)> = None;
        self.for_each_line(|_, line| {
            if let Some(ts) = extract::extract_timestamp(line) {
                stamped += 1;
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                    None => (ts, ts),
                });
            }
            ControlFlow::Continue(())
        })?;

        let Some((start_time, end_time)) = range else {
            return Ok(TimelineData::default());
        };

        let picks = timeline::sample_positions(stamped, sample_count);
        let mut samples = Vec::with_capacity(picks.len());
        let mut next_pick = picks.iter().copied().peekable();
        let mut position = 0usize;

        self.for_each_line(|index, line| {
            let Some(ts) = extract::extract_timestamp(line) else {
                return ControlFlow::Continue(());
            };
            if next_pick.peek() == Some(&position) {
                next_pick.next();
                samples.push(TimelineSample {
                    line_number: index + 1,
                    timestamp: ts,
                    level: extract::extract_level(line),
                });
            }
            position += 1;
            if next_pick.peek().is_none() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(TimelineData {
            start_time: Some(start_time),
            end_time: Some(end_time),
            samples,
        })
    }
}

impl LineSource for LineScanner {
    fn total_lines(&self) -> Result<usize> {
        LineScanner::total_lines(self)
    }

    fn read_range(&self, start: usize, count: usize) -> Result<Vec<LogRecord>> {
        LineScanner::read_range(self, start, count)
    }

    fn find_first_at_or_after(&self, target: NaiveDateTime) -> Result<Option<LogRecord>> {
        LineScanner::find_first_at_or_after(self, target)
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate::CutMode;
    use crate::record::Level;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_log(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn ts(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn sample_log() -> NamedTempFile {
        write_log(&[
            "2024-01-01 10:00:00 INFO [main] app.Boot started",
            "2024-01-01 10:00:05 WARN [main] slow disk",
            "continuation without timestamp",
            "2024-01-01 10:00:10 ERROR [worker-1] app.Job <run> failed",
            "2024-01-01 10:00:15 DEBUG [worker-1] tick",
        ])
    }

    #[test]
    fn test_total_lines() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        assert_eq!(scanner.total_lines().unwrap(), 5);
    }

    #[test]
    fn test_total_lines_without_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "one\ntwo\nthree").unwrap();
        file.flush().unwrap();
        let scanner = LineScanner::new(file.path());
        assert_eq!(scanner.total_lines().unwrap(), 3);
        assert_eq!(scanner.read_range(2, 5).unwrap()[0].content, "three");
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let scanner = LineScanner::new(file.path());
        assert_eq!(scanner.total_lines().unwrap(), 0);
        assert!(scanner.read_range(0, 10).unwrap().is_empty());
        assert_eq!(scanner.sample_timeline(10).unwrap(), TimelineData::default());
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "first\r\nsecond\r\n").unwrap();
        file.flush().unwrap();
        let records = LineScanner::new(file.path()).read_all().unwrap();
        assert_eq!(records[0].content, "first");
        assert_eq!(records[1].content, "second");
    }

    #[test]
    fn test_read_range_clips_at_end() {
        let lines: Vec<String> = (1..=10_000).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_log(&refs);
        let scanner = LineScanner::new(file.path());

        let records = scanner.read_range(9_990, 100).unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].line_number, 9_991);
        assert_eq!(records[9].content, "line 10000");
    }

    #[test]
    fn test_read_range_past_end_and_zero_count() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        assert!(scanner.read_range(50, 10).unwrap().is_empty());
        assert!(scanner.read_range(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\n\xff\xfe broken\n").unwrap();
        file.flush().unwrap();
        let records = LineScanner::new(file.path()).read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].content.ends_with("broken"));
    }

    #[test]
    fn test_search_modes() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());

        let plain = scanner.search("WORKER", KeywordMode::Plain, false).unwrap();
        assert_eq!(plain.len(), 2);

        let regex = scanner.search(r"10:00:(05|15)", KeywordMode::Regex, false).unwrap();
        assert_eq!(regex.iter().map(|r| r.line_number).collect::<Vec<_>>(), vec![2, 5]);

        let multi = scanner.search("worker failed", KeywordMode::MultiAnd, false).unwrap();
        assert_eq!(multi.len(), 1);
        assert_eq!(multi[0].line_number, 4);
    }

    #[test]
    fn test_search_reverse_is_complement() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let hits = scanner.search("main", KeywordMode::Plain, false).unwrap();
        let misses = scanner.search("main", KeywordMode::Plain, true).unwrap();
        assert_eq!(hits.len() + misses.len(), 5);
        assert!(misses.iter().all(|r| !r.content.contains("main")));
    }

    #[test]
    fn test_search_rejects_bad_regex() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let err = scanner.search("([", KeywordMode::Regex, false).unwrap_err();
        assert!(matches!(err, ViewerError::MalformedPattern { .. }));
    }

    #[test]
    fn test_filter_by_level_with_other() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let selection = LevelSelection::new(["error", "OTHER"]);
        let records = scanner.filter_by_level(&selection).unwrap();
        assert_eq!(records.iter().map(|r| r.line_number).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_filter_by_level_empty_selection_keeps_all() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let records = scanner.filter_by_level(&LevelSelection::default()).unwrap();
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_advanced_search_joins() {
        use crate::filter::condition::{Condition, ConditionJoin, MatchType};
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let conditions = vec![
            Condition::Thread {
                value: "worker".to_string(),
                match_type: MatchType::Contains,
            },
            Condition::Keyword {
                value: "TICK".to_string(),
            },
        ];
        let lines = |join| -> Vec<usize> {
            scanner
                .advanced_search(&ConditionSet::new(join, conditions.clone()))
                .unwrap()
                .iter()
                .map(|r| r.line_number)
                .collect()
        };
        assert_eq!(lines(ConditionJoin::And), vec![5]);
        assert_eq!(lines(ConditionJoin::Or), vec![4, 5]);

        let err = scanner.advanced_search(&ConditionSet::default()).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidArgument(_)));
    }

    #[test]
    fn test_preview_by_time_partitions_file() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let rule = KeepRule::ByTime {
            target: ts("2024-01-01 10:00:10"),
            mode: CutMode::Before,
        };
        let kept = scanner.preview(&rule, true).unwrap();
        let removed = scanner.preview(&rule, false).unwrap();

        assert_eq!(kept.len() + removed.len(), 5);
        // The untimestamped continuation line is always kept.
        assert!(kept.iter().any(|r| r.line_number == 3));
        assert_eq!(removed.iter().map(|r| r.line_number).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_preview_by_line() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let rule = KeepRule::ByLine {
            line: 4,
            mode: CutMode::After,
        };
        let removed = scanner.preview(&rule, false).unwrap();
        assert_eq!(removed.iter().map(|r| r.line_number).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_find_first_at_or_after() {
        let file = sample_log();
        let scanner = LineScanner::new(file.path());
        let found = scanner
            .find_first_at_or_after(ts("2024-01-01 10:00:06"))
            .unwrap()
            .unwrap();
        assert_eq!(found.line_number, 4);
        assert!(scanner
            .find_first_at_or_after(ts("2030-01-01 00:00:00"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_statistics_full_scan() {
        let file = sample_log();
        let stats = LineScanner::new(file.path()).statistics().unwrap();
        assert_eq!(stats.total_lines, 5);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.warn_count, 1);
        assert_eq!(stats.info_count, 1);
        assert_eq!(stats.debug_count, 1);
        assert_eq!(stats.other_count, 1);
        assert_eq!(stats.thread_counts.get("worker-1"), Some(&2));
        let range = stats.time_range.unwrap();
        assert_eq!(range.start, ts("2024-01-01 10:00:00"));
        assert_eq!(range.end, ts("2024-01-01 10:00:15"));
    }

    #[test]
    fn test_sample_timeline_uniform() {
        let lines: Vec<String> = (0..100)
            .map(|i| format!("2024-01-01 10:{:02}:{:02} INFO tick", i / 60, i % 60))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_log(&refs);

        let data = LineScanner::new(file.path()).sample_timeline(10).unwrap();
        assert_eq!(data.samples.len(), 10);
        assert_eq!(data.samples[0].line_number, 1);
        assert_eq!(data.samples[1].line_number, 11);
        assert_eq!(data.samples[0].level, Some(Level::Info));
        assert_eq!(data.start_time, Some(ts("2024-01-01 10:00:00")));
        assert_eq!(data.end_time, Some(ts("2024-01-01 10:01:39")));
    }

    #[test]
    fn test_open_rejects_missing_file() {
        let err = LineScanner::open("/definitely/not/here.log").unwrap_err();
        assert!(matches!(err, ViewerError::Io { .. }));
    }
}
