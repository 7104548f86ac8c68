//! Text normalization shared by search and topic extraction.
//!
//! Matching is case-insensitive and works on tokens split at anything that is neither
//! alphanumeric nor a middle dot (`3·1` stays one token). A single-word keyword also matches
//! a token that extends it by a short suffix, so `변수` matches `변수가` and `cat` matches
//! `cats`, while `cat` does not match `category`.

use std::collections::HashSet;

/// Longest suffix (in characters) a token may add to a single-word keyword.
pub const MAX_KEYWORD_SUFFIX: usize = 3;

/// Lowercase and split text into tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '·'))
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Tokens joined by single spaces; the canonical form phrases are compared in.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// A query preprocessed once for repeated matching.
#[derive(Debug, Clone)]
pub struct QueryText {
    tokens: Vec<String>,
    /// Normalized text padded with a leading space for word-start matching.
    padded: String,
}

impl QueryText {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let padded = format!(" {}", tokens.join(" "));
        Self { tokens, padded }
    }

    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Distinct query tokens.
    pub fn distinct_tokens(&self) -> HashSet<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }

    /// Whether a keyword occurs in the query.
    ///
    /// Multi-word keywords match as a phrase starting at a word boundary; single words match
    /// a token equal to them or extending them by at most [`MAX_KEYWORD_SUFFIX`] characters.
    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let keyword_tokens = tokenize(keyword);
        match keyword_tokens.as_slice() {
            [] => false,
            [single] => self.tokens.iter().any(|token| {
                token
                    .strip_prefix(single.as_str())
                    .is_some_and(|rest| rest.chars().count() <= MAX_KEYWORD_SUFFIX)
            }),
            _ => self.contains_phrase(&keyword_tokens.join(" ")),
        }
    }

    /// Whether an already-normalized phrase occurs starting at a word boundary.
    pub fn contains_phrase(&self, normalized: &str) -> bool {
        !normalized.is_empty() && self.padded.contains(&format!(" {normalized}"))
    }
}
