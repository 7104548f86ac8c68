//! Keyword matching against turn text.

/// Decides whether a trigger or milestone keyword occurs in a turn.
///
/// Implementations may use anything from substring search to a classifier; the update engine
/// only needs a yes or no per keyword.
pub trait TurnMatcher: Send + Sync {
    fn matches(&self, turn_text: &str, keyword: &str) -> bool;
}

/// Case-insensitive substring matching. Blank keywords never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl TurnMatcher for KeywordMatcher {
    fn matches(&self, turn_text: &str, keyword: &str) -> bool {
        let keyword = keyword.trim();
        !keyword.is_empty() && turn_text.to_lowercase().contains(&keyword.to_lowercase())
    }
}
