pub mod cancel;
pub mod condition;
pub mod multi_keyword;
pub mod pipeline;
pub mod regex_filter;
pub mod state;
pub mod string_filter;

use crate::error::{Result, ViewerError};
use multi_keyword::MultiKeywordFilter;
use regex_filter::RegexFilter;
use state::KeywordMode;
use string_filter::StringFilter;

/// A matcher over the raw content of a line.
pub trait Filter: Send + Sync {
    fn matches(&self, line: &str) -> bool;

    /// Short human-readable form, used in debug logs.
    fn describe(&self) -> String;
}

/// Build the case-insensitive content matcher for a keyword.
///
/// A regex that fails to compile is reported as `MalformedPattern` and never
/// silently downgraded to a plain substring match.
pub fn keyword_filter(keyword: &str, mode: KeywordMode) -> Result<Box<dyn Filter>> {
    Ok(match mode {
        KeywordMode::Plain => Box::new(StringFilter::new(keyword)),
        KeywordMode::Regex => Box::new(RegexFilter::new(keyword).map_err(|source| {
            ViewerError::MalformedPattern {
                pattern: keyword.to_string(),
                source,
            }
        })?),
        KeywordMode::MultiAnd => Box::new(MultiKeywordFilter::new(keyword)),
    })
}
