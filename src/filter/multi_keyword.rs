use super::Filter;

/// Matches lines that contain every whitespace-separated token, ignoring case.
pub struct MultiKeywordFilter {
    tokens: Vec<String>,
}

impl MultiKeywordFilter {
    pub fn new(keywords: &str) -> Self {
        Self {
            tokens: keywords
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl Filter for MultiKeywordFilter {
    fn matches(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.tokens.iter().all(|t| lowered.contains(t.as_str()))
    }

    fn describe(&self) -> String {
        format!("All of: {}", self.tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tokens_required() {
        let filter = MultiKeywordFilter::new("  user   LOGIN failed ");
        assert_eq!(filter.tokens(), ["user", "login", "failed"]);
        assert!(filter.matches("WARN user alice login FAILED"));
        assert!(!filter.matches("WARN user alice login ok"));
    }

    #[test]
    fn test_token_order_irrelevant() {
        let filter = MultiKeywordFilter::new("b a");
        assert!(filter.matches("a then b"));
    }

    #[test]
    fn test_no_tokens_matches_everything() {
        let filter = MultiKeywordFilter::new("   ");
        assert!(filter.matches("anything"));
    }
}
