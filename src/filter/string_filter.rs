use super::Filter;
use memchr::memmem;

/// Plain keyword match, ignoring case.
///
/// The keyword is lowercased once into a `memmem` finder; each line is
/// lowercased (ASCII-only when it can be) and searched with it.
pub struct StringFilter {
    needle: String,
    finder: memmem::Finder<'static>,
}

impl StringFilter {
    pub fn new(keyword: &str) -> Self {
        let needle = keyword.to_lowercase();
        let finder = memmem::Finder::new(needle.as_bytes()).into_owned();
        Self { needle, finder }
    }
}

impl Filter for StringFilter {
    fn matches(&self, line: &str) -> bool {
        let lowered = if line.is_ascii() {
            line.to_ascii_lowercase()
        } else {
            line.to_lowercase()
        };
        self.finder.find(lowered.as_bytes()).is_some()
    }

    fn describe(&self) -> String {
        format!("contains {:?}", self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_case() {
        let filter = StringFilter::new("TimeOut");
        assert!(filter.matches("upstream timeout after 30s"));
        assert!(filter.matches("UPSTREAM TIMEOUT"));
        assert!(!filter.matches("time out"));
    }

    #[test]
    fn test_non_ascii_line() {
        assert!(StringFilter::new("ÜBER").matches("Fehler über alles"));
        assert!(StringFilter::new("cafe").matches("Café cafe"));
    }

    #[test]
    fn test_keyword_longer_than_line() {
        assert!(!StringFilter::new("much longer keyword").matches("short"));
    }

    #[test]
    fn test_empty_keyword_matches_everything() {
        assert!(StringFilter::new("").matches("anything"));
        assert!(StringFilter::new("").matches(""));
    }

    #[test]
    fn test_describe() {
        assert_eq!(StringFilter::new("Disk").describe(), "contains \"disk\"");
    }
}
