//! Applies a [`FilterState`] to buffered records.
//!
//! Criteria are evaluated in a fixed order (keyword, thread, class, method,
//! levels, time range, advanced conditions) and a record must pass all of
//! them. The result keeps source order and shares the source records instead
//! of copying them.

use super::condition::CompiledConditions;
use super::keyword_filter;
use super::state::{FilterState, LevelSelection, TimeBounds};
use super::Filter;
use crate::error::Result;
use crate::record::{LogRecord, SharedRecord};
use std::sync::Arc;

/// An ordered, immutable subsequence of buffered records.
#[derive(Debug, Clone)]
pub struct FilteredView {
    records: Arc<[SharedRecord]>,
    filtered: bool,
}

impl FilteredView {
    /// A view of every record in `source`.
    pub fn identity(source: &[SharedRecord]) -> Self {
        Self {
            records: source.iter().cloned().collect(),
            filtered: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            filtered: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SharedRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&SharedRecord> {
        self.records.get(index)
    }

    /// Cheap handle for background tasks.
    pub fn snapshot(&self) -> Arc<[SharedRecord]> {
        Arc::clone(&self.records)
    }

    /// True when at least one criterion was applied.
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Position of the record with `line_number`, if it is in the view.
    pub fn position_of_line(&self, line_number: usize) -> Option<usize> {
        self.records
            .binary_search_by_key(&line_number, |r| r.line_number)
            .ok()
    }
}

/// A [`FilterState`] with its keyword matcher compiled once.
pub struct CompiledFilter {
    keyword: Option<Box<dyn Filter>>,
    thread_name: Option<String>,
    class_name: Option<String>,
    method_name: Option<String>,
    levels: LevelSelection,
    time_range: Option<TimeBounds>,
    conditions: Option<CompiledConditions>,
}

impl CompiledFilter {
    pub fn compile(state: &FilterState) -> Result<Self> {
        let state = state.clone().normalized();
        let keyword = match &state.keyword {
            Some(keyword) => {
                let matcher = keyword_filter(keyword, state.keyword_mode)?;
                log::debug!("keyword filter: {}", matcher.describe());
                Some(matcher)
            }
            None => None,
        };
        let conditions = CompiledConditions::compile(&state.conditions)?;
        Ok(Self {
            keyword,
            thread_name: state.thread_name,
            class_name: state.class_name,
            method_name: state.method_name,
            levels: state.levels,
            time_range: state.time_range,
            conditions,
        })
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(keyword) = &self.keyword {
            if !keyword.matches(&record.content) {
                return false;
            }
        }
        if let Some(thread) = &self.thread_name {
            if record.thread_name.as_deref() != Some(thread.as_str()) {
                return false;
            }
        }
        if let Some(class) = &self.class_name {
            if !record
                .class_name
                .as_deref()
                .is_some_and(|c| c.contains(class.as_str()))
            {
                return false;
            }
        }
        if let Some(method) = &self.method_name {
            if record.method_name.as_deref() != Some(method.as_str()) {
                return false;
            }
        }
        if !self.levels.admits(record) {
            return false;
        }
        if let Some(range) = &self.time_range {
            match record.timestamp {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }
        self.conditions.as_ref().map_or(true, |c| c.matches(record))
    }
}

/// Filter `source` by `state`.
///
/// Fails only when the keyword is a malformed regex, in which case nothing
/// is filtered.
pub fn apply(state: &FilterState, source: &[SharedRecord]) -> Result<FilteredView> {
    if state.is_identity() {
        return Ok(FilteredView::identity(source));
    }
    let compiled = CompiledFilter::compile(state)?;
    let records: Arc<[SharedRecord]> = source
        .iter()
        .filter(|r| compiled.matches(r))
        .cloned()
        .collect();
    log::debug!("filter kept {} of {} records", records.len(), source.len());
    Ok(FilteredView {
        records,
        filtered: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::filter::state::KeywordMode;
    use chrono::NaiveDateTime;

    fn records(lines: &[&str]) -> Vec<SharedRecord> {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| Arc::new(LogRecord::parse(i + 1, *line)))
            .collect()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn sample() -> Vec<SharedRecord> {
        records(&[
            "2024-01-01 10:00:00 INFO [main] com.acme.Api <start> boot",
            "2024-01-01 10:05:00 ERROR [pool-1] com.acme.db.Repo <save> disk full",
            "    at com.acme.db.Repo.save(Repo.java:10)",
            "2024-01-01 10:10:00 WARN [pool-1] com.acme.db.Repo <save> retry",
            "2024-01-01 10:15:00 ERROR [main] com.acme.Api <stop> disk gone",
        ])
    }

    fn lines(view: &FilteredView) -> Vec<usize> {
        view.records().iter().map(|r| r.line_number).collect()
    }

    #[test]
    fn test_identity_shares_records() {
        let source = sample();
        let view = apply(&FilterState::default(), &source).unwrap();
        assert!(!view.is_filtered());
        assert_eq!(view.len(), source.len());
        for (a, b) in view.records().iter().zip(&source) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_keyword_and_level_combined() {
        let source = sample();
        let state = FilterState::default()
            .with_keyword("DISK", KeywordMode::Plain)
            .with_levels(["error"]);
        let view = apply(&state, &source).unwrap();
        assert_eq!(lines(&view), vec![2, 5]);
    }

    #[test]
    fn test_thread_is_exact_and_class_is_substring() {
        let source = sample();
        let state = FilterState {
            thread_name: Some("pool-1".to_string()),
            class_name: Some("db.Re".to_string()),
            ..Default::default()
        };
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![2, 4]);

        let partial_thread = FilterState {
            thread_name: Some("pool".to_string()),
            ..Default::default()
        };
        assert!(apply(&partial_thread, &source).unwrap().is_empty());
    }

    #[test]
    fn test_method_exact() {
        let source = sample();
        let state = FilterState {
            method_name: Some("save".to_string()),
            ..Default::default()
        };
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_time_range_excludes_untimestamped() {
        let source = sample();
        let state = FilterState {
            time_range: Some(TimeBounds {
                start: Some(at("2024-01-01 10:05:00")),
                end: Some(at("2024-01-01 10:10:00")),
            }),
            ..Default::default()
        };
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_other_level_includes_continuations() {
        let source = sample();
        let state = FilterState::default().with_levels(["OTHER"]);
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![3]);
    }

    #[test]
    fn test_malformed_regex_fails_whole_filter() {
        let source = sample();
        let state = FilterState::default().with_keyword("disk(", KeywordMode::Regex);
        let err = apply(&state, &source).unwrap_err();
        assert!(matches!(err, ViewerError::MalformedPattern { .. }));
    }

    #[test]
    fn test_view_is_ordered_subsequence() {
        let source = sample();
        let state = FilterState::default().with_keyword("com.acme", KeywordMode::Plain);
        let view = apply(&state, &source).unwrap();
        let numbers = lines(&view);
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(view.position_of_line(4), Some(3));
        assert_eq!(view.position_of_line(99), None);
    }

    #[test]
    fn test_conditions_narrow_after_fields() {
        use crate::filter::condition::{Condition, ConditionJoin, ConditionSet, MatchType};
        let source = sample();
        let any = ConditionSet::new(
            ConditionJoin::Or,
            vec![
                Condition::Thread {
                    value: "main".to_string(),
                    match_type: MatchType::Exact,
                },
                Condition::Level {
                    levels: LevelSelection::new(["warn"]),
                },
            ],
        );
        let state = FilterState::default().with_conditions(any.clone());
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![1, 4, 5]);

        let state = state.with_keyword("disk", KeywordMode::Plain);
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![5]);

        let all = ConditionSet::new(ConditionJoin::And, any.conditions);
        let state = FilterState::default().with_conditions(all);
        assert!(apply(&state, &source).unwrap().is_empty());
    }

    #[test]
    fn test_multi_keyword_mode() {
        let source = sample();
        let state = FilterState::default().with_keyword("repo retry", KeywordMode::MultiAnd);
        assert_eq!(lines(&apply(&state, &source).unwrap()), vec![4]);
    }
}
