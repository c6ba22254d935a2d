//! Aggregate counts over a set of records.
//!
//! A snapshot is a commutative monoid: merging the statistics of two disjoint
//! record sets gives the statistics of their union, so snapshots can be built
//! in parallel and extended chunk by chunk without rescanning.

pub mod timeline;

use crate::record::{Level, LogRecord, SharedRecord};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Records per rayon task when building from a slice.
const PARALLEL_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    fn widen(self, other: TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_lines: usize,
    pub error_count: usize,
    pub warn_count: usize,
    pub info_count: usize,
    pub debug_count: usize,
    /// Records without a recognised level.
    pub other_count: usize,
    pub time_range: Option<TimeRange>,
    pub class_counts: HashMap<String, usize>,
    pub method_counts: HashMap<String, usize>,
    pub thread_counts: HashMap<String, usize>,
}

impl StatisticsSnapshot {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut snapshot = Self::default();
        snapshot.extend(records);
        snapshot
    }

    /// Same result as [`from_records`](Self::from_records), computed on the rayon pool.
    pub fn par_from_records(records: &[SharedRecord]) -> Self {
        records
            .par_chunks(PARALLEL_CHUNK)
            .map(|chunk| Self::from_records(chunk.iter().map(|r| r.as_ref())))
            .reduce(Self::default, |mut left, right| {
                left.merge(right);
                left
            })
    }

    pub fn absorb(&mut self, record: &LogRecord) {
        self.total_lines += 1;
        match record.level {
            Some(Level::Error) => self.error_count += 1,
            Some(Level::Warn) => self.warn_count += 1,
            Some(Level::Info) => self.info_count += 1,
            Some(Level::Debug) => self.debug_count += 1,
            None => self.other_count += 1,
        }
        if let Some(ts) = record.timestamp {
            let point = TimeRange { start: ts, end: ts };
            self.time_range = Some(match self.time_range {
                Some(range) => range.widen(point),
                None => point,
            });
        }
        bump(&mut self.class_counts, record.class_name.as_deref());
        bump(&mut self.method_counts, record.method_name.as_deref());
        bump(&mut self.thread_counts, record.thread_name.as_deref());
    }

    pub fn extend<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        for record in records {
            self.absorb(record);
        }
    }

    /// Fold another snapshot into this one.
    pub fn merge(&mut self, other: StatisticsSnapshot) {
        self.total_lines += other.total_lines;
        self.error_count += other.error_count;
        self.warn_count += other.warn_count;
        self.info_count += other.info_count;
        self.debug_count += other.debug_count;
        self.other_count += other.other_count;
        self.time_range = match (self.time_range, other.time_range) {
            (Some(a), Some(b)) => Some(a.widen(b)),
            (a, b) => a.or(b),
        };
        merge_counts(&mut self.class_counts, other.class_counts);
        merge_counts(&mut self.method_counts, other.method_counts);
        merge_counts(&mut self.thread_counts, other.thread_counts);
    }

    pub fn count_for(&self, level: Option<Level>) -> usize {
        match level {
            Some(Level::Error) => self.error_count,
            Some(Level::Warn) => self.warn_count,
            Some(Level::Info) => self.info_count,
            Some(Level::Debug) => self.debug_count,
            None => self.other_count,
        }
    }

    /// Serializable view with the `top_n` most frequent classes, methods and threads.
    pub fn summary(&self, top_n: usize) -> StatisticsSummary {
        StatisticsSummary {
            total_lines: self.total_lines,
            error_count: self.error_count,
            warn_count: self.warn_count,
            info_count: self.info_count,
            debug_count: self.debug_count,
            other_count: self.other_count,
            time_range: self.time_range,
            top_classes: top_entries(&self.class_counts, top_n),
            top_methods: top_entries(&self.method_counts, top_n),
            top_threads: top_entries(&self.thread_counts, top_n),
        }
    }
}

fn bump(counts: &mut HashMap<String, usize>, key: Option<&str>) {
    if let Some(key) = key {
        match counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                counts.insert(key.to_string(), 1);
            }
        }
    }
}

fn merge_counts(into: &mut HashMap<String, usize>, from: HashMap<String, usize>) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    pub name: String,
    pub count: usize,
}

/// Most frequent first; equal counts ordered by name.
pub fn top_entries(counts: &HashMap<String, usize>, n: usize) -> Vec<FrequencyEntry> {
    let mut entries: Vec<FrequencyEntry> = counts
        .iter()
        .map(|(name, &count)| FrequencyEntry {
            name: name.clone(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(n);
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub total_lines: usize,
    pub error_count: usize,
    pub warn_count: usize,
    pub info_count: usize,
    pub debug_count: usize,
    pub other_count: usize,
    pub time_range: Option<TimeRange>,
    pub top_classes: Vec<FrequencyEntry>,
    pub top_methods: Vec<FrequencyEntry>,
    pub top_threads: Vec<FrequencyEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shared(lines: &[&str]) -> Vec<SharedRecord> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| Arc::new(LogRecord::parse(i + 1, *l)))
            .collect()
    }

    fn corpus() -> Vec<SharedRecord> {
        let mut lines = Vec::new();
        for i in 0..300 {
            let level = ["ERROR", "WARN", "INFO", "DEBUG", "NOTE"][i % 5];
            lines.push(format!(
                "2024-02-{:02} 12:00:{:02} {} [t-{}] org.app.Svc{} <op{}> body",
                1 + i % 28,
                i % 60,
                level,
                i % 3,
                i % 4,
                i % 2
            ));
        }
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        shared(&refs)
    }

    #[test]
    fn test_level_counts_partition_total() {
        let records = corpus();
        let stats = StatisticsSnapshot::from_records(records.iter().map(|r| r.as_ref()));
        assert_eq!(stats.total_lines, 300);
        assert_eq!(
            stats.error_count
                + stats.warn_count
                + stats.info_count
                + stats.debug_count
                + stats.other_count,
            stats.total_lines
        );
        assert_eq!(stats.other_count, 60);
        assert_eq!(stats.thread_counts.len(), 3);
        assert_eq!(stats.count_for(None), 60);
    }

    #[test]
    fn test_incremental_equals_full() {
        let records = corpus();
        let full = StatisticsSnapshot::from_records(records.iter().map(|r| r.as_ref()));

        let (a, b) = records.split_at(117);
        let mut incremental = StatisticsSnapshot::from_records(a.iter().map(|r| r.as_ref()));
        incremental.extend(b.iter().map(|r| r.as_ref()));
        assert_eq!(incremental, full);

        let mut merged = StatisticsSnapshot::from_records(b.iter().map(|r| r.as_ref()));
        merged.merge(StatisticsSnapshot::from_records(a.iter().map(|r| r.as_ref())));
        assert_eq!(merged, full);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut records = Vec::new();
        for _ in 0..40 {
            records.extend(corpus());
        }
        let sequential = StatisticsSnapshot::from_records(records.iter().map(|r| r.as_ref()));
        assert_eq!(StatisticsSnapshot::par_from_records(&records), sequential);
    }

    #[test]
    fn test_time_range_tracks_extremes() {
        let records = shared(&[
            "2024-01-02 00:00:00 INFO b",
            "no time",
            "2024-01-01 00:00:00 INFO a",
            "2024-01-03 00:00:00 INFO c",
        ]);
        let stats = StatisticsSnapshot::from_records(records.iter().map(|r| r.as_ref()));
        let range = stats.time_range.unwrap();
        assert_eq!(range.start.to_string(), "2024-01-01 00:00:00");
        assert_eq!(range.end.to_string(), "2024-01-03 00:00:00");
    }

    #[test]
    fn test_top_entries_order_and_limit() {
        let mut counts = HashMap::new();
        counts.insert("b".to_string(), 5);
        counts.insert("a".to_string(), 5);
        counts.insert("c".to_string(), 9);
        counts.insert("d".to_string(), 1);
        let top = top_entries(&counts, 3);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let records = corpus();
        let stats = StatisticsSnapshot::from_records(records.iter().map(|r| r.as_ref()));
        let json = serde_json::to_value(stats.summary(2)).unwrap();
        assert_eq!(json["totalLines"], 300);
        assert_eq!(json["topThreads"].as_array().unwrap().len(), 2);
    }
}
