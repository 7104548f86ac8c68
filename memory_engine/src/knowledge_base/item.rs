//! Knowledge items - the entries a character can talk about.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for knowledge items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeItemId(pub Uuid);

impl KnowledgeItemId {
    /// Create a new random item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KnowledgeItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KnowledgeItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A piece of character knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: KnowledgeItemId,

    pub title: String,

    /// The text injected into prompts.
    pub content: String,

    /// Keywords that make this item relevant; also the cache's topic vocabulary.
    pub keywords: BTreeSet<String>,

    #[serde(default)]
    pub category: String,

    /// Score multiplier, at least 1.
    pub priority: u32,

    /// How many times search has returned this item.
    #[serde(default)]
    pub usage_count: u64,
}

impl KnowledgeItem {
    /// Create a new item with priority 1.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: KnowledgeItemId::new(),
            title: title.into(),
            content: content.into(),
            keywords: BTreeSet::new(),
            category: String::new(),
            priority: 1,
            usage_count: 0,
        }
    }

    /// Add a keyword. Blank keywords are ignored.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into().trim().to_string();
        if !keyword.is_empty() {
            self.keywords.insert(keyword);
        }
        self
    }

    /// Add multiple keywords.
    pub fn with_keywords<S: Into<String>>(self, keywords: impl IntoIterator<Item = S>) -> Self {
        keywords
            .into_iter()
            .fold(self, |item, keyword| item.with_keyword(keyword))
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the priority; values below 1 become 1.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority.max(1);
        self
    }

    pub fn with_id(mut self, id: KnowledgeItemId) -> Self {
        self.id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let item = KnowledgeItem::new("Variables", "A variable stores a value.")
            .with_keywords(["변수", " variable ", ""])
            .with_category("programming")
            .with_priority(3);

        assert_eq!(item.keywords.len(), 2);
        assert!(item.keywords.contains("variable"));
        assert_eq!(item.category, "programming");
        assert_eq!(item.priority, 3);
        assert_eq!(item.usage_count, 0);
    }

    #[test]
    fn test_priority_at_least_one() {
        let item = KnowledgeItem::new("t", "c").with_priority(0);
        assert_eq!(item.priority, 1);
    }

    #[test]
    fn test_serde_defaults() {
        let id = KnowledgeItemId::new();
        let json = format!(
            r#"{{"id":"{id}","title":"t","content":"c","keywords":["k"],"priority":2}}"#
        );
        let item: KnowledgeItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.category, "");
        assert_eq!(item.usage_count, 0);
    }
}
