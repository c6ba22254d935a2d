//! The user's current filter choices.

use super::condition::ConditionSet;
use crate::reader::extract::canonical_level;
use crate::record::LogRecord;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a keyword is matched against line content. Always case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeywordMode {
    /// Substring match.
    #[default]
    Plain,
    /// Regular expression match.
    Regex,
    /// Every whitespace-separated token must occur somewhere in the line.
    MultiAnd,
}

/// Set of level labels (`ERROR`, `WARN`, `INFO`, `DEBUG`, `OTHER`).
///
/// Names are upper-cased and aliases such as `WARNING` are folded on
/// construction. An empty selection means "no level filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LevelSelection(BTreeSet<String>);

impl LevelSelection {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_ascii_uppercase())
                .filter(|n| !n.is_empty())
                .map(|n| match canonical_level(&n) {
                    Some(level) => level.as_str().to_string(),
                    None => n,
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn contains(&self, record: &LogRecord) -> bool {
        self.contains_label(record.level_label())
    }

    /// Whether a record labelled `label` passes this selection as a filter.
    /// An empty selection passes everything.
    pub fn admits_label(&self, label: &str) -> bool {
        self.is_empty() || self.contains_label(label)
    }

    pub fn admits(&self, record: &LogRecord) -> bool {
        self.admits_label(record.level_label())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for LevelSelection {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<LevelSelection> for Vec<String> {
    fn from(selection: LevelSelection) -> Self {
        selection.0.into_iter().collect()
    }
}

/// Inclusive time bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
}

impl TimeBounds {
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Names a single criterion so it can be cleared on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    Keyword,
    Thread,
    Class,
    Method,
    Levels,
    TimeRange,
    Conditions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub keyword: Option<String>,
    pub keyword_mode: KeywordMode,
    /// Exact match on the extracted thread name.
    pub thread_name: Option<String>,
    /// Substring match on the extracted class name.
    pub class_name: Option<String>,
    /// Exact match on the extracted method name.
    pub method_name: Option<String>,
    pub levels: LevelSelection,
    pub time_range: Option<TimeBounds>,
    /// Advanced search, applied on top of the fields above.
    pub conditions: ConditionSet,
}

impl FilterState {
    /// Blank strings and unbounded ranges become absent criteria.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        blank_to_none(&mut self.keyword);
        blank_to_none(&mut self.thread_name);
        blank_to_none(&mut self.class_name);
        blank_to_none(&mut self.method_name);
        if self.time_range.is_some_and(|r| r.is_unbounded()) {
            self.time_range = None;
        }
        self.conditions = self.conditions.normalized();
        self
    }

    /// True when no criterion is active and the view equals its source.
    pub fn is_identity(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.keyword)
            && blank(&self.thread_name)
            && blank(&self.class_name)
            && blank(&self.method_name)
            && self.levels.is_empty()
            && self.time_range.map_or(true, |r| r.is_unbounded())
            && self.conditions.is_inactive()
    }

    pub fn clear(&mut self, field: FilterField) {
        match field {
            FilterField::Keyword => self.keyword = None,
            FilterField::Thread => self.thread_name = None,
            FilterField::Class => self.class_name = None,
            FilterField::Method => self.method_name = None,
            FilterField::Levels => self.levels = LevelSelection::default(),
            FilterField::TimeRange => self.time_range = None,
            FilterField::Conditions => self.conditions = ConditionSet::default(),
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>, mode: KeywordMode) -> Self {
        self.keyword = Some(keyword.into());
        self.keyword_mode = mode;
        self
    }

    pub fn with_levels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.levels = LevelSelection::new(names);
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }
}
