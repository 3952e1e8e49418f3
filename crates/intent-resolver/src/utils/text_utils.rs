//! Text normalization helpers for keyword and phrase matching

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

pub struct TextUtils;

impl TextUtils {
    /// Normalize whitespace efficiently
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.is_match(text) {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Lower-cased words with leading and trailing punctuation stripped.
    /// Inner punctuation survives so "0.80" and "north_raybn" stay whole.
    pub fn words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| !word.is_empty())
            .collect()
    }

    /// Whether `phrase` occurs in `words` as a run of whole words
    pub fn contains_phrase(words: &[String], phrase: &str) -> bool {
        let needle = Self::words(phrase);
        if needle.is_empty() || needle.len() > words.len() {
            return false;
        }
        words.windows(needle.len()).any(|window| window == needle.as_slice())
    }

    /// First phrase from `phrases` found in `words`
    pub fn find_phrase<'a>(words: &[String], phrases: &[&'a str]) -> Option<&'a str> {
        phrases.iter().copied().find(|p| Self::contains_phrase(words, p))
    }

    pub fn is_blank(text: &str) -> bool {
        text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(TextUtils::normalize_whitespace("  same   but\tfor  houston "), "same but for houston");
    }

    #[test]
    fn test_words_strip_punctuation_but_keep_numbers() {
        let words = TextUtils::words("Same, but threshold 0.80!");
        assert_eq!(words, vec!["same", "but", "threshold", "0.80"]);
    }

    #[test]
    fn test_contains_phrase_whole_words_only() {
        let words = TextUtils::words("Show me the sameness of loads");
        assert!(!TextUtils::contains_phrase(&words, "same"));
        assert!(TextUtils::contains_phrase(&words, "show me"));
        assert!(!TextUtils::contains_phrase(&words, "me show"));
    }

    #[test]
    fn test_contains_phrase_multiword() {
        let words = TextUtils::words("ok, now with a threshold of 0.7");
        assert!(TextUtils::contains_phrase(&words, "now with"));
        assert!(!TextUtils::contains_phrase(&words, "but for"));
        assert!(!TextUtils::contains_phrase(&words, ""));
    }

    #[test]
    fn test_find_phrase() {
        let words = TextUtils::words("please repeat that");
        assert_eq!(TextUtils::find_phrase(&words, &["again", "repeat"]), Some("repeat"));
        assert_eq!(TextUtils::find_phrase(&words, &["again"]), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(TextUtils::is_blank("  \n\t"));
        assert!(!TextUtils::is_blank(" x "));
    }
}
