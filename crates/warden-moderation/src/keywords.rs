//! Keyword detection.

/// Finds configured keywords in message bodies.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    // (original, needle) pairs; needle is lowercased when matching ignores case
    keywords: Vec<(String, String)>,
    case_sensitive: bool,
}

impl KeywordMatcher {
    /// Builds a matcher, skipping blank keywords.
    pub fn new<S: AsRef<str>>(keywords: &[S], case_sensitive: bool) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(|k| {
                let needle = if case_sensitive {
                    k.to_string()
                } else {
                    k.to_lowercase()
                };
                (k.to_string(), needle)
            })
            .collect();
        Self {
            keywords,
            case_sensitive,
        }
    }

    /// Whether no keyword is configured.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Configured keywords contained in `content`, in configuration order.
    pub fn find_matches(&self, content: &str) -> Vec<String> {
        if self.keywords.is_empty() || content.is_empty() {
            return Vec::new();
        }
        let haystack = if self.case_sensitive {
            content.to_string()
        } else {
            content.to_lowercase()
        };

        let mut found: Vec<String> = Vec::new();
        for (keyword, needle) in &self.keywords {
            if haystack.contains(needle.as_str()) && !found.contains(keyword) {
                found.push(keyword.clone());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_matching() {
        let matcher = KeywordMatcher::new(&["Spam", "scam"], false);
        assert_eq!(matcher.find_matches("buy SPAM now"), vec!["Spam"]);
        assert_eq!(matcher.find_matches("a scam and spam"), vec!["Spam", "scam"]);
        assert!(matcher.find_matches("all good").is_empty());
    }

    #[test]
    fn test_case_sensitive_matching() {
        let matcher = KeywordMatcher::new(&["Spam"], true);
        assert!(matcher.find_matches("spam").is_empty());
        assert_eq!(matcher.find_matches("Spam"), vec!["Spam"]);
    }

    #[test]
    fn test_blank_keywords_ignored() {
        let matcher = KeywordMatcher::new(&["", "   "], false);
        assert!(matcher.is_empty());
        assert!(matcher.find_matches("anything").is_empty());
    }
}
