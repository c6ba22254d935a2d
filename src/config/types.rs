//! Config types for biglog.

use crate::buffer::LoaderConfig;
use crate::pagination::task::PageTaskConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Keys accepted in a config file, used for typo suggestions.
pub const KNOWN_KEYS: &[&str] = &[
    "page_size",
    "chunk_size",
    "load_delay_ms",
    "page_batch_size",
    "page_batch_delay_ms",
    "collapse_min_repeat_count",
    "full_load_threshold",
    "initial_window",
    "timeline_sample_points",
    "timeline_buckets",
    "top_n",
    "max_lines_per_request",
];

/// Raw config file structure. Every key is optional; unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub page_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub load_delay_ms: Option<u64>,
    pub page_batch_size: Option<usize>,
    pub page_batch_delay_ms: Option<u64>,
    pub collapse_min_repeat_count: Option<usize>,
    pub full_load_threshold: Option<usize>,
    pub initial_window: Option<usize>,
    pub timeline_sample_points: Option<usize>,
    pub timeline_buckets: Option<usize>,
    pub top_n: Option<usize>,
    pub max_lines_per_request: Option<usize>,
}

/// Effective settings after defaults, global config and project config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Records per page (display rows per page in collapse mode).
    pub page_size: usize,
    /// Lines per background chunk.
    pub chunk_size: usize,
    /// Pause between background chunks.
    pub load_delay_ms: u64,
    /// Collapse pages computed per background batch.
    pub page_batch_size: usize,
    pub page_batch_delay_ms: u64,
    pub collapse_min_repeat_count: usize,
    /// Files with at most this many lines are loaded whole on open.
    pub full_load_threshold: usize,
    /// Lines loaded on open for larger files.
    pub initial_window: usize,
    pub timeline_sample_points: usize,
    pub timeline_buckets: usize,
    /// Entries per frequency table in statistics output.
    pub top_n: usize,
    /// Cap on `count` for a single range read over the web API.
    pub max_lines_per_request: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 100,
            chunk_size: 5_000,
            load_delay_ms: 500,
            page_batch_size: 5,
            page_batch_delay_ms: 10,
            collapse_min_repeat_count: 2,
            full_load_threshold: 50_000,
            initial_window: 10_000,
            timeline_sample_points: 200,
            timeline_buckets: 50,
            top_n: 20,
            max_lines_per_request: 5_000,
        }
    }
}

impl Settings {
    /// Override fields present in `raw`.
    pub fn apply(&mut self, raw: RawConfig) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = raw.$field {
                    self.$field = value;
                })*
            };
        }
        take!(
            page_size,
            chunk_size,
            load_delay_ms,
            page_batch_size,
            page_batch_delay_ms,
            collapse_min_repeat_count,
            full_load_threshold,
            initial_window,
            timeline_sample_points,
            timeline_buckets,
            top_n,
            max_lines_per_request,
        );
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            chunk_size: self.chunk_size,
            delay: Duration::from_millis(self.load_delay_ms),
        }
    }

    pub fn page_task_config(&self) -> PageTaskConfig {
        PageTaskConfig {
            batch_size: self.page_batch_size,
            batch_delay: Duration::from_millis(self.page_batch_delay_ms),
        }
    }

    /// Settings with no pauses, for tests and one-shot command-line use.
    pub fn without_delays(mut self) -> Self {
        self.load_delay_ms = 0;
        self.page_batch_delay_ms = 0;
        self
    }

    /// Fields that must be at least 1, with their values.
    pub(crate) fn counts(&self) -> [(&'static str, usize); 10] {
        [
            ("page_size", self.page_size),
            ("chunk_size", self.chunk_size),
            ("page_batch_size", self.page_batch_size),
            ("collapse_min_repeat_count", self.collapse_min_repeat_count),
            ("full_load_threshold", self.full_load_threshold),
            ("initial_window", self.initial_window),
            ("timeline_sample_points", self.timeline_sample_points),
            ("timeline_buckets", self.timeline_buckets),
            ("top_n", self.top_n),
            ("max_lines_per_request", self.max_lines_per_request),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides_only_present_keys() {
        let mut settings = Settings::default();
        settings.apply(RawConfig {
            page_size: Some(250),
            load_delay_ms: Some(0),
            ..Default::default()
        });
        assert_eq!(settings.page_size, 250);
        assert_eq!(settings.load_delay_ms, 0);
        assert_eq!(settings.chunk_size, 5_000);
    }

    #[test]
    fn test_known_keys_cover_counts() {
        for (name, _) in Settings::default().counts() {
            assert!(KNOWN_KEYS.contains(&name), "{} missing from KNOWN_KEYS", name);
        }
    }

    #[test]
    fn test_task_configs() {
        let settings = Settings::default();
        assert_eq!(settings.loader_config().chunk_size, 5_000);
        assert_eq!(settings.loader_config().delay, Duration::from_millis(500));
        assert_eq!(settings.page_task_config().batch_size, 5);
        assert_eq!(
            settings.without_delays().page_task_config().batch_delay,
            Duration::ZERO
        );
    }
}
