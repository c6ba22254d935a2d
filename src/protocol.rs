//! Request/response messages exchanged with a host.
//!
//! Both directions are adjacently tagged JSON objects,
//! `{"command": "<name>", "data": {...}}`, with camelCase names throughout.

use crate::config::Settings;
use crate::error::{Result, ViewerError};
use crate::filter::condition::{ConditionJoin, ConditionSet};
use crate::filter::state::{KeywordMode, LevelSelection};
use crate::mutate::{export_records, export_target, CutMode, FileMutator, KeepRule};
use crate::reader::extract::parse_time;
use crate::reader::LineScanner;
use crate::record::LogRecord;
use crate::stats::timeline::TimelineData;
use crate::stats::StatisticsSummary;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Open the file: total line count plus the first window of records.
    LoadFile,
    GetTotalLines,
    /// `start` is the 0-based index of the first line.
    ReadLines { start: usize, count: usize },
    Search {
        keyword: String,
        #[serde(default)]
        mode: KeywordMode,
        #[serde(default)]
        reverse: bool,
    },
    FilterByLevel { levels: LevelSelection },
    /// Conditions on content, thread, class, method, level or time joined by AND or OR.
    AdvancedSearch(ConditionSet),
    /// Preview a time cut without touching the file.
    FilterByTime {
        target: String,
        mode: CutMode,
        keep: bool,
    },
    /// Preview a line cut without touching the file. `target` is 1-based.
    FilterByLine {
        target: usize,
        mode: CutMode,
        keep: bool,
    },
    DeleteByTime { target: String, mode: CutMode },
    DeleteByLine { target: usize, mode: CutMode },
    GetStatistics,
    SampleTimeline {
        #[serde(default)]
        samples: Option<usize>,
    },
    /// Write the content of `records` to `path`, one per line. `path` is
    /// relative to the directory of the viewed file.
    ExportLogs { path: PathBuf, records: Vec<LogRecord> },
    JumpToTime { time: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStage {
    Lines,
    Pages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "command",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Response {
    FileLoaded {
        file_name: String,
        file_size: u64,
        total_lines: usize,
        lines: Vec<LogRecord>,
        all_loaded: bool,
    },
    TotalLines { total_lines: usize },
    MoreLines { start_line: usize, lines: Vec<LogRecord> },
    SearchResults { keyword: String, results: Vec<LogRecord> },
    FilterResults { levels: LevelSelection, results: Vec<LogRecord> },
    AdvancedSearchResults { join: ConditionJoin, results: Vec<LogRecord> },
    PreviewResults { keep: bool, results: Vec<LogRecord> },
    MutationComplete {
        kept: usize,
        deleted: usize,
        total_lines: usize,
    },
    StatisticsResults(StatisticsSummary),
    TimelineData(TimelineData),
    JumpToTimeResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_line_number: Option<usize>,
        lines: Vec<LogRecord>,
        start_line: usize,
    },
    LoadingProgress {
        progress: u8,
        current: usize,
        total: usize,
        stage: LoadStage,
    },
    ExportComplete { path: PathBuf, count: usize },
    Error { kind: String, message: String },
}

impl Response {
    pub fn error(err: &ViewerError) -> Self {
        Response::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    /// Name of the `command` tag.
    pub fn command(&self) -> &'static str {
        match self {
            Response::FileLoaded { .. } => "fileLoaded",
            Response::TotalLines { .. } => "totalLines",
            Response::MoreLines { .. } => "moreLines",
            Response::SearchResults { .. } => "searchResults",
            Response::FilterResults { .. } => "filterResults",
            Response::AdvancedSearchResults { .. } => "advancedSearchResults",
            Response::PreviewResults { .. } => "previewResults",
            Response::MutationComplete { .. } => "mutationComplete",
            Response::StatisticsResults(_) => "statisticsResults",
            Response::TimelineData(_) => "timelineData",
            Response::JumpToTimeResult { .. } => "jumpToTimeResult",
            Response::LoadingProgress { .. } => "loadingProgress",
            Response::ExportComplete { .. } => "exportComplete",
            Response::Error { .. } => "error",
        }
    }
}

/// Percentage of `current` out of `total`, 100 for an empty total.
pub fn percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((current.min(total) as u128 * 100) / total as u128) as u8
}

/// First line of the window shown around a jump target: half a page above it.
pub fn jump_window_start(target_index: usize, page_size: usize) -> usize {
    target_index.saturating_sub(page_size / 2)
}

pub fn parse_target_time(text: &str) -> Result<NaiveDateTime> {
    parse_time(text).ok_or_else(|| ViewerError::UnparsableTime(text.to_string()))
}

/// Answer one request against the file behind `scanner`.
///
/// Range reads are capped at `settings.max_lines_per_request` records.
pub fn dispatch(scanner: &LineScanner, request: Request, settings: &Settings) -> Result<Response> {
    match request {
        Request::LoadFile => {
            let total_lines = scanner.total_lines()?;
            let all_loaded = total_lines <= settings.full_load_threshold;
            let lines = if all_loaded {
                scanner.read_all()?
            } else {
                scanner.read_range(0, settings.initial_window)?
            };
            Ok(Response::FileLoaded {
                file_name: scanner.file_name(),
                file_size: scanner.file_size()?,
                total_lines,
                lines,
                all_loaded,
            })
        }
        Request::GetTotalLines => Ok(Response::TotalLines {
            total_lines: scanner.total_lines()?,
        }),
        Request::ReadLines { start, count } => Ok(Response::MoreLines {
            start_line: start,
            lines: scanner.read_range(start, count.min(settings.max_lines_per_request))?,
        }),
        Request::Search {
            keyword,
            mode,
            reverse,
        } => {
            let results = scanner.search(&keyword, mode, reverse)?;
            Ok(Response::SearchResults { keyword, results })
        }
        Request::FilterByLevel { levels } => {
            let results = scanner.filter_by_level(&levels)?;
            Ok(Response::FilterResults { levels, results })
        }
        Request::AdvancedSearch(set) => {
            let results = scanner.advanced_search(&set)?;
            Ok(Response::AdvancedSearchResults {
                join: set.join,
                results,
            })
        }
        Request::FilterByTime { target, mode, keep } => {
            let rule = KeepRule::ByTime {
                target: parse_target_time(&target)?,
                mode,
            };
            Ok(Response::PreviewResults {
                keep,
                results: scanner.preview(&rule, keep)?,
            })
        }
        Request::FilterByLine { target, mode, keep } => {
            let rule = KeepRule::ByLine { line: target, mode };
            Ok(Response::PreviewResults {
                keep,
                results: scanner.preview(&rule, keep)?,
            })
        }
        Request::DeleteByTime { target, mode } => {
            let rule = KeepRule::ByTime {
                target: parse_target_time(&target)?,
                mode,
            };
            mutation(scanner, &rule)
        }
        Request::DeleteByLine { target, mode } => {
            mutation(scanner, &KeepRule::ByLine { line: target, mode })
        }
        Request::GetStatistics => Ok(Response::StatisticsResults(
            scanner.statistics()?.summary(settings.top_n),
        )),
        Request::SampleTimeline { samples } => Ok(Response::TimelineData(
            scanner.sample_timeline(samples.unwrap_or(settings.timeline_sample_points))?,
        )),
        Request::ExportLogs { path, records } => {
            let path = export_target(scanner.path(), &path)?;
            let count = export_records(&records, &path)?;
            Ok(Response::ExportComplete { path, count })
        }
        Request::JumpToTime { time } => {
            let target = parse_target_time(&time)?;
            let Some(found) = scanner.find_first_at_or_after(target)? else {
                return Ok(Response::JumpToTimeResult {
                    success: false,
                    target_line_number: None,
                    lines: Vec::new(),
                    start_line: 0,
                });
            };
            let start = jump_window_start(found.index(), settings.page_size);
            let count = settings.initial_window.min(settings.max_lines_per_request);
            Ok(Response::JumpToTimeResult {
                success: true,
                target_line_number: Some(found.line_number),
                lines: scanner.read_range(start, count)?,
                start_line: start,
            })
        }
    }
}

fn mutation(scanner: &LineScanner, rule: &KeepRule) -> Result<Response> {
    let outcome = FileMutator::new(scanner.path()).delete(rule)?;
    Ok(Response::MutationComplete {
        kept: outcome.kept,
        deleted: outcome.deleted,
        total_lines: outcome.kept,
    })
}
