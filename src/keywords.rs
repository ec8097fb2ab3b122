//! Keyword engagement scanner.
//!
//! Counts whole-word (or hashtag) occurrences of a configured keyword set in
//! free text. Each keyword counts at most once per scanned text; results from
//! several texts accumulate into a single [`KeywordMatchResult`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keywords that earn the Telegram "engage bonus" when no list is configured.
pub const DEFAULT_ENGAGE_KEYWORDS: [&str; 3] = ["cluster", "protocol", "ai"];

/// Per-keyword hit counts plus their total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMatchResult {
    pub total_count: u32,
    pub keywords: BTreeMap<String, u32>,
}

impl KeywordMatchResult {
    /// Zero result with every keyword pre-seeded to 0.
    pub fn empty(keywords: &[String]) -> Self {
        Self {
            total_count: 0,
            keywords: keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| (k.to_lowercase(), 0))
                .collect(),
        }
    }

    /// Scans one text field and adds its matches to this result.
    pub fn absorb(&mut self, text: &str, keywords: &[String]) {
        if text.is_empty() {
            return;
        }
        let haystack = text.to_lowercase();
        // Keywords that differ only by case are one keyword.
        let mut seen: Vec<String> = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            let needle = keyword.to_lowercase();
            if needle.is_empty() || seen.contains(&needle) {
                continue;
            }
            seen.push(needle.clone());
            if let Some(pos) = find_whole_word(&haystack, &needle) {
                let count = self.keywords.entry(needle.clone()).or_insert(0);
                *count = count.saturating_add(1);
                self.total_count = self.total_count.saturating_add(1);
                tracing::debug!("Keyword match: '{}' at position {}", needle, pos);
            }
        }
    }
}

/// Scans `text` for each keyword in `keywords`.
///
/// Matching is case-insensitive. A hit at byte offset `p` counts only when the
/// character before `p` is not ASCII alphanumeric (a leading `#` is fine) and
/// the character after the match is not ASCII alphanumeric. Anything outside
/// ASCII is treated as a word boundary.
pub fn scan(text: &str, keywords: &[String]) -> KeywordMatchResult {
    let mut result = KeywordMatchResult::empty(keywords);
    result.absorb(text, keywords);
    result
}

/// Scans several text fields independently and accumulates the hits.
pub fn scan_all<'a, I>(texts: I, keywords: &[String]) -> KeywordMatchResult
where
    I: IntoIterator<Item = &'a str>,
{
    let mut result = KeywordMatchResult::empty(keywords);
    for text in texts {
        result.absorb(text, keywords);
    }
    result
}

/// The default engage keywords as owned strings.
pub fn default_keywords() -> Vec<String> {
    DEFAULT_ENGAGE_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// First whole-word occurrence of `needle` in `haystack`, both already lowercased.
fn find_whole_word(haystack: &str, needle: &str) -> Option<usize> {
    // Step by the needle's first char so every slice start stays on a char boundary.
    let step = needle.chars().next().map(char::len_utf8).unwrap_or(1);
    let mut from = 0;

    while from <= haystack.len() {
        let found = from + haystack[from..].find(needle)?;
        let end = found + needle.len();

        let starts_word = haystack[..found]
            .chars()
            .next_back()
            .map_or(true, |c| c == '#' || !c.is_ascii_alphanumeric());
        let ends_word = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric());

        if starts_word && ends_word {
            return Some(found);
        }
        from = found + step;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw() -> Vec<String> {
        default_keywords()
    }

    #[test]
    fn test_empty_text_yields_zero() {
        let result = scan("", &kw());
        assert_eq!(result.total_count, 0);
        assert_eq!(result.keywords.get("ai"), Some(&0));
        assert_eq!(result.keywords.len(), 3);
    }

    #[test]
    fn test_substring_of_longer_word_is_ignored() {
        let result = scan("clustering is not the same as a cluster-free plan", &kw());
        // "cluster-free" still has a boundary after "cluster"
        assert_eq!(result.keywords["cluster"], 1);

        let result = scan("clustering and clusters", &kw());
        assert_eq!(result.total_count, 0);
    }

    #[test]
    fn test_hashtag_prefix_counts() {
        let result = scan("#protocol rocks", &kw());
        assert_eq!(result.keywords["protocol"], 1);
        assert_eq!(result.total_count, 1);
    }

    #[test]
    fn test_keyword_counted_once_per_text() {
        let result = scan("AI ai Ai and more ai", &kw());
        assert_eq!(result.keywords["ai"], 1);
        assert_eq!(result.total_count, 1);
    }

    #[test]
    fn test_later_whole_word_found_after_partial_hits() {
        let result = scan("maintain the said ai", &kw());
        assert_eq!(result.keywords["ai"], 1);
    }

    #[test]
    fn test_unicode_neighbours_are_boundaries() {
        let result = scan("ÜBER·protocol·ß and 🤖ai🤖", &kw());
        assert_eq!(result.keywords["protocol"], 1);
        assert_eq!(result.keywords["ai"], 1);
    }

    #[test]
    fn test_scan_all_accumulates_fields() {
        let texts = ["new protocol launch", "the protocol is AI driven", "nothing"];
        let result = scan_all(texts.iter().copied(), &kw());
        assert_eq!(result.keywords["protocol"], 2);
        assert_eq!(result.keywords["ai"], 1);
        assert_eq!(result.total_count, 3);
    }

    #[test]
    fn test_custom_keyword_set_is_case_insensitive() {
        let keywords = vec!["DeFi".to_string()];
        let result = scan("Into defi since 2020", &keywords);
        assert_eq!(result.keywords["defi"], 1);
    }

    #[test]
    fn test_case_variants_of_one_keyword_count_once() {
        let keywords = vec!["ai".to_string(), "AI".to_string(), "Ai".to_string()];
        let result = scan("ai is everywhere", &keywords);
        assert_eq!(result.total_count, 1);
        assert_eq!(result.keywords["ai"], 1);
        assert_eq!(result.keywords.len(), 1);
    }
}
