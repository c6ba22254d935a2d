use super::Filter;
use regex::{Regex, RegexBuilder};

/// Keyword treated as a case-insensitive regular expression.
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|regex| Self { regex })
    }
}

impl Filter for RegexFilter {
    fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    fn describe(&self) -> String {
        format!("matches /{}/i", self.regex.as_str())
    }
}
