//! Multi-condition search: a list of per-field conditions joined by AND or OR.

use super::multi_keyword::MultiKeywordFilter;
use super::state::{LevelSelection, TimeBounds};
use super::Filter;
use crate::error::{Result, ViewerError};
use crate::reader::extract::parse_time;
use crate::record::LogRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    Exact,
    /// Case-insensitive substring.
    #[default]
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionJoin {
    #[default]
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

/// One criterion of an advanced search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Condition {
    /// Every whitespace-separated token must occur in the content.
    Keyword { value: String },
    Thread {
        value: String,
        #[serde(default)]
        match_type: MatchType,
    },
    Class {
        value: String,
        #[serde(default)]
        match_type: MatchType,
    },
    Method {
        value: String,
        #[serde(default)]
        match_type: MatchType,
    },
    Level { levels: LevelSelection },
    /// Inclusive bounds in any accepted timestamp layout; a blank side is open.
    Time {
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
    },
}

impl Condition {
    /// False for conditions that cannot narrow anything: blank values,
    /// no levels or every level, and a time range with neither side set.
    pub fn is_active(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match self {
            Condition::Keyword { value }
            | Condition::Thread { value, .. }
            | Condition::Class { value, .. }
            | Condition::Method { value, .. } => !value.trim().is_empty(),
            Condition::Level { levels } => !levels.is_empty() && levels.len() < 5,
            Condition::Time {
                start_time,
                end_time,
            } => filled(start_time) || filled(end_time),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionSet {
    #[serde(alias = "logic")]
    pub join: ConditionJoin,
    pub conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(join: ConditionJoin, conditions: Vec<Condition>) -> Self {
        Self { join, conditions }
    }

    /// True when no condition is active.
    pub fn is_inactive(&self) -> bool {
        !self.conditions.iter().any(Condition::is_active)
    }

    pub fn normalized(mut self) -> Self {
        self.conditions.retain(Condition::is_active);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum RecordField {
    Thread,
    Class,
    Method,
}

impl RecordField {
    fn of(self, record: &LogRecord) -> Option<&str> {
        match self {
            RecordField::Thread => record.thread_name.as_deref(),
            RecordField::Class => record.class_name.as_deref(),
            RecordField::Method => record.method_name.as_deref(),
        }
    }
}

enum CompiledCondition {
    Keyword(MultiKeywordFilter),
    Field {
        field: RecordField,
        /// Lower-cased for `Contains`.
        value: String,
        match_type: MatchType,
    },
    Level(LevelSelection),
    Time(TimeBounds),
}

impl CompiledCondition {
    fn compile(condition: &Condition) -> Result<Self> {
        let field = |field: RecordField, value: &str, match_type: MatchType| {
            let value = value.trim();
            let value = match match_type {
                MatchType::Exact => value.to_string(),
                MatchType::Contains => value.to_lowercase(),
            };
            CompiledCondition::Field {
                field,
                value,
                match_type,
            }
        };
        Ok(match condition {
            Condition::Keyword { value } => CompiledCondition::Keyword(MultiKeywordFilter::new(value)),
            Condition::Thread { value, match_type } => field(RecordField::Thread, value, *match_type),
            Condition::Class { value, match_type } => field(RecordField::Class, value, *match_type),
            Condition::Method { value, match_type } => field(RecordField::Method, value, *match_type),
            Condition::Level { levels } => CompiledCondition::Level(levels.clone()),
            Condition::Time {
                start_time,
                end_time,
            } => CompiledCondition::Time(TimeBounds {
                start: parse_bound(start_time.as_deref())?,
                end: parse_bound(end_time.as_deref())?,
            }),
        })
    }

    fn matches(&self, record: &LogRecord) -> bool {
        match self {
            CompiledCondition::Keyword(filter) => filter.matches(&record.content),
            CompiledCondition::Field {
                field,
                value,
                match_type,
            } => match field.of(record) {
                None => false,
                Some(actual) => match match_type {
                    MatchType::Exact => actual == value,
                    MatchType::Contains => actual.to_lowercase().contains(value.as_str()),
                },
            },
            CompiledCondition::Level(levels) => levels.contains(record),
            CompiledCondition::Time(bounds) => record.timestamp.is_some_and(|ts| bounds.contains(ts)),
        }
    }
}

fn parse_bound(text: Option<&str>) -> Result<Option<chrono::NaiveDateTime>> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(t) => parse_time(t)
            .map(Some)
            .ok_or_else(|| ViewerError::UnparsableTime(t.to_string())),
    }
}

/// A [`ConditionSet`] with inactive conditions dropped and times parsed.
pub struct CompiledConditions {
    join: ConditionJoin,
    conditions: Vec<CompiledCondition>,
}

impl CompiledConditions {
    /// `None` when no condition is active.
    pub fn compile(set: &ConditionSet) -> Result<Option<Self>> {
        let conditions = set
            .conditions
            .iter()
            .filter(|c| c.is_active())
            .map(CompiledCondition::compile)
            .collect::<Result<Vec<_>>>()?;
        if conditions.is_empty() {
            return Ok(None);
        }
        log::debug!("{} search conditions joined by {:?}", conditions.len(), set.join);
        Ok(Some(Self {
            join: set.join,
            conditions,
        }))
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        match self.join {
            ConditionJoin::And => self.conditions.iter().all(|c| c.matches(record)),
            ConditionJoin::Or => self.conditions.iter().any(|c| c.matches(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<LogRecord> {
        [
            "2024-01-01 10:00:00 INFO [main] com.acme.Api <start> boot",
            "2024-01-01 10:05:00 ERROR [pool-1] com.acme.db.Repo <save> disk full",
            "    at com.acme.db.Repo.save(Repo.java:10)",
            "2024-01-01 10:10:00 WARN [pool-2] com.acme.db.Repo <load> retry",
        ]
        .iter()
        .enumerate()
        .map(|(i, line)| LogRecord::parse(i + 1, *line))
        .collect()
    }

    fn matching(set: &ConditionSet) -> Vec<usize> {
        let compiled = CompiledConditions::compile(set).unwrap().unwrap();
        sample()
            .iter()
            .filter(|r| compiled.matches(r))
            .map(|r| r.line_number)
            .collect()
    }

    #[test]
    fn test_and_requires_every_condition() {
        let set = ConditionSet::new(
            ConditionJoin::And,
            vec![
                Condition::Thread {
                    value: "POOL".to_string(),
                    match_type: MatchType::Contains,
                },
                Condition::Level {
                    levels: LevelSelection::new(["warn"]),
                },
            ],
        );
        assert_eq!(matching(&set), vec![4]);
    }

    #[test]
    fn test_or_accepts_any_condition() {
        let set = ConditionSet::new(
            ConditionJoin::Or,
            vec![
                Condition::Keyword {
                    value: "BOOT".to_string(),
                },
                Condition::Method {
                    value: "load".to_string(),
                    match_type: MatchType::Exact,
                },
            ],
        );
        assert_eq!(matching(&set), vec![1, 4]);
    }

    #[test]
    fn test_exact_field_is_case_sensitive_and_missing_field_fails() {
        let set = ConditionSet::new(
            ConditionJoin::Or,
            vec![Condition::Thread {
                value: "Main".to_string(),
                match_type: MatchType::Exact,
            }],
        );
        assert!(matching(&set).is_empty());

        let contains = ConditionSet::new(
            ConditionJoin::And,
            vec![Condition::Class {
                value: "repo".to_string(),
                match_type: MatchType::Contains,
            }],
        );
        assert_eq!(matching(&contains), vec![2, 3, 4]);
    }

    #[test]
    fn test_time_condition_needs_timestamp() {
        let set = ConditionSet::new(
            ConditionJoin::And,
            vec![Condition::Time {
                start_time: Some("2024-01-01 10:05:00".to_string()),
                end_time: None,
            }],
        );
        assert_eq!(matching(&set), vec![2, 4]);
    }

    #[test]
    fn test_inactive_conditions_dropped() {
        let set = ConditionSet::new(
            ConditionJoin::And,
            vec![
                Condition::Keyword {
                    value: "  ".to_string(),
                },
                Condition::Level {
                    levels: LevelSelection::new(["ERROR", "WARN", "INFO", "DEBUG", "OTHER"]),
                },
                Condition::Time {
                    start_time: Some(String::new()),
                    end_time: None,
                },
            ],
        );
        assert!(set.is_inactive());
        assert!(CompiledConditions::compile(&set).unwrap().is_none());
        assert!(set.normalized().conditions.is_empty());
    }

    #[test]
    fn test_unparsable_time_rejected() {
        let set = ConditionSet::new(
            ConditionJoin::And,
            vec![Condition::Time {
                start_time: Some("yesterday".to_string()),
                end_time: None,
            }],
        );
        let err = CompiledConditions::compile(&set).err().unwrap();
        assert!(matches!(err, ViewerError::UnparsableTime(_)));
    }

    #[test]
    fn test_wire_form() {
        let set: ConditionSet = serde_json::from_str(
            r#"{"logic":"OR","conditions":[
                {"type":"thread","value":"main","matchType":"exact"},
                {"type":"level","levels":["error"]},
                {"type":"time","startTime":"2024-01-01 10:00:00"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(set.join, ConditionJoin::Or);
        assert_eq!(set.conditions.len(), 3);
        assert_eq!(matching(&set), vec![1, 2, 4]);
    }
}
