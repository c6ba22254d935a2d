//! Timeline sampling and level histogram buckets.

use crate::record::Level;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// Time spans shorter than this (in milliseconds) are not worth drawing.
pub const MIN_TIMELINE_SPAN_MS: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSample {
    pub line_number: usize,
    pub timestamp: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub samples: Vec<TimelineSample>,
}

/// Positions `0..total` to sample so that `count` picks are evenly spread.
///
/// Returns every position when `total <= count`. Positions are strictly
/// increasing.
pub fn sample_positions(total: usize, count: usize) -> Vec<usize> {
    if count == 0 || total == 0 {
        return Vec::new();
    }
    if total <= count {
        return (0..total).collect();
    }
    (0..count).map(|i| i * total / count).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCounts {
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub debug: usize,
    pub other: usize,
}

impl LevelCounts {
    fn add(&mut self, level: Option<Level>) {
        match level {
            Some(Level::Error) => self.error += 1,
            Some(Level::Warn) => self.warn += 1,
            Some(Level::Info) => self.info += 1,
            Some(Level::Debug) => self.debug += 1,
            None => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.warn + self.info + self.debug + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub counts: LevelCounts,
}

/// Split the sampled time span into `bucket_count` equal buckets.
///
/// Returns `None` when there are no samples or the span is shorter than
/// [`MIN_TIMELINE_SPAN_MS`].
pub fn bucketize(data: &TimelineData, bucket_count: usize) -> Option<Vec<TimelineBucket>> {
    let (start, end) = (data.start_time?, data.end_time?);
    let span_ms = (end - start).num_milliseconds();
    if bucket_count == 0 || data.samples.is_empty() || span_ms < MIN_TIMELINE_SPAN_MS {
        return None;
    }

    let mut buckets: Vec<TimelineBucket> = (0..bucket_count as i64)
        .map(|i| TimelineBucket {
            start: start + Duration::milliseconds(span_ms * i / bucket_count as i64),
            end: start + Duration::milliseconds(span_ms * (i + 1) / bucket_count as i64),
            counts: LevelCounts::default(),
        })
        .collect();

    for sample in &data.samples {
        let offset = (sample.timestamp - start).num_milliseconds().clamp(0, span_ms);
        let index = ((offset * bucket_count as i64) / span_ms) as usize;
        buckets[index.min(bucket_count - 1)].counts.add(sample.level);
    }

    Some(buckets)
}
