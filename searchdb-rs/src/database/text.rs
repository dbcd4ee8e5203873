//! Term normalization used for both indexing and lookups.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Longest indexed term, in chars.
pub const WORD_MAX_LENGTH: usize = 64;

/// Shortest indexed word and shortest variation, in chars.
pub const MIN_WORD_LENGTH: usize = 3;

const COMMON_WORDS: &[&str] = &[
    "the", "and", "inc", "its", "this", "that", "not", "are", "was", "were", "been", "have", "has",
    "had", "does", "did", "can", "could", "may", "might", "must", "shall", "should", "will",
    "would", "for", "from",
];

static WORD_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,:\s]+").unwrap());

/// Trim quotes, dots, colons and whitespace from both ends.
pub fn clean_up(word: &str) -> &str {
    word.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '.' | ':'))
}

pub fn is_common_word(word: &str) -> bool {
    COMMON_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// Whether a cleaned-up word is too short or too common to index.
pub fn should_skip(word: &str, skip_common_words: bool) -> bool {
    word.chars().count() < MIN_WORD_LENGTH || (skip_common_words && is_common_word(word))
}

/// NFC-normalize and, unless `case_sensitive`, lowercase.
pub fn fold_case(word: &str, case_sensitive: bool) -> String {
    let normalized: String = word.trim().nfc().collect();
    if case_sensitive {
        normalized
    } else {
        normalized.to_lowercase()
    }
}

/// Strip simple English plurals: `-ses` loses `es`, and a trailing `s`
/// after `t`, `r`, `n` or `d` is dropped. Words under 4 chars are kept.
pub fn strip_plural(word: &str) -> &str {
    let bytes = word.as_bytes();
    if word.chars().count() < 4 {
        return word;
    }
    let n = bytes.len();
    if bytes[n - 3..].eq_ignore_ascii_case(b"ses") {
        return &word[..n - 2];
    }
    if bytes[n - 1].eq_ignore_ascii_case(&b's')
        && matches!(bytes[n - 2].to_ascii_lowercase(), b't' | b'r' | b'n' | b'd')
    {
        return &word[..n - 1];
    }
    word
}

pub fn remove_punctuation(word: &str) -> String {
    word.chars()
        .filter(|c| !matches!(c, '.' | ',' | ':' | ';'))
        .collect()
}

/// Cut a term down to [`WORD_MAX_LENGTH`] chars.
pub fn truncate(term: String) -> String {
    match term.char_indices().nth(WORD_MAX_LENGTH) {
        Some((at, _)) => {
            tracing::warn!(term = %term, "term longer than {} chars was truncated", WORD_MAX_LENGTH);
            term[..at].to_string()
        }
        None => term,
    }
}

/// Char prefixes of `term` from one char shorter down to [`MIN_WORD_LENGTH`],
/// skipping prefixes that end in whitespace.
pub fn variations(term: &str) -> Vec<String> {
    let ends: Vec<usize> = term.char_indices().map(|(i, _)| i).skip(MIN_WORD_LENGTH).collect();
    ends.into_iter()
        .rev()
        .filter(|&end| !term[..end].ends_with(char::is_whitespace))
        .map(|end| term[..end].to_string())
        .collect()
}

/// Split free text into cleaned-up words.
pub fn split_words(text: &str) -> impl Iterator<Item = &str> {
    WORD_SEPARATOR
        .split(text)
        .map(clean_up)
        .filter(|word| !word.is_empty())
}

/// Lookup forms for a query term: the folded term and its singular form.
pub fn query_terms(term: &str, case_sensitive: bool) -> Vec<String> {
    let folded = truncate(fold_case(term, case_sensitive));
    let singular = strip_plural(&folded).to_string();
    if singular != folded {
        vec![folded, singular]
    } else {
        vec![folded]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_up() {
        assert_eq!(clean_up("  \"Hello.\": "), "Hello");
        assert_eq!(clean_up("'u.s.'"), "u.s");
        assert_eq!(clean_up("..."), "");
    }

    #[test]
    fn test_strip_plural() {
        assert_eq!(strip_plural("cars"), "car");
        assert_eq!(strip_plural("CARS"), "CAR");
        assert_eq!(strip_plural("buses"), "bus");
        assert_eq!(strip_plural("bonds"), "bond");
        assert_eq!(strip_plural("cats"), "cat");
        assert_eq!(strip_plural("bus"), "bus");
        assert_eq!(strip_plural("this"), "this");
        assert_eq!(strip_plural("gas"), "gas");
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("MÉlanie", false), "mélanie");
        assert_eq!(fold_case("MÉlanie", true), "MÉlanie");
        // decomposed e + combining acute composes to the same term
        assert_eq!(fold_case("Me\u{301}lanie", false), "mélanie");
    }

    #[test]
    fn test_skip_rules() {
        assert!(should_skip("is", false));
        assert!(!should_skip("the", false));
        assert!(should_skip("The", true));
        assert!(!should_skip("apple", true));
    }

    #[test]
    fn test_variations() {
        assert_eq!(variations("hello"), vec!["hell", "hel"]);
        assert_eq!(variations("hel"), Vec::<String>::new());
        assert_eq!(variations("café"), vec!["caf"]);
        assert_eq!(
            variations("super cool!"),
            vec!["super cool", "super coo", "super co", "super c", "super", "supe", "sup"]
        );
    }

    #[test]
    fn test_split_words() {
        let words: Vec<&str> = split_words("Apple Inc., tech: \"phones\"  and more.").collect();
        assert_eq!(words, vec!["Apple", "Inc", "tech", "phones", "and", "more"]);
    }

    #[test]
    fn test_truncate() {
        let long = "a".repeat(80);
        assert_eq!(truncate(long).chars().count(), WORD_MAX_LENGTH);
        assert_eq!(truncate("short".to_string()), "short");
    }

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("Cars", false), vec!["cars", "car"]);
        assert_eq!(query_terms("smith", false), vec!["smith"]);
    }
}
