//! Knowledge Index - weighted relevance search over one character's items.
//!
//! Scoring per item:
//! - 10 per keyword found in the query
//! - 5 if the title occurs in the query
//! - 3 if the category occurs in the query
//! - 1 per distinct query token that is also a word of the content
//!
//! The total is multiplied by the item's priority. Zero-score items are never returned.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{normalize, tokenize, KnowledgeItem, KnowledgeItemId, QueryText};

pub const KEYWORD_WEIGHT: u64 = 10;
pub const TITLE_WEIGHT: u64 = 5;
pub const CATEGORY_WEIGHT: u64 = 3;
pub const CONTENT_WORD_WEIGHT: u64 = 1;

/// An item as stored in the index, with its precomputed match forms.
#[derive(Debug)]
struct IndexedItem {
    item: KnowledgeItem,
    title: String,
    category: String,
    content_words: HashSet<String>,
    usage: AtomicU64,
}

impl IndexedItem {
    fn snapshot(&self) -> KnowledgeItem {
        let mut item = self.item.clone();
        item.usage_count = self.usage.load(Ordering::Relaxed);
        item
    }

    fn score(&self, query: &QueryText) -> u64 {
        let keyword_hits = self
            .item
            .keywords
            .iter()
            .filter(|keyword| query.contains_keyword(keyword))
            .count() as u64;

        let mut score = keyword_hits * KEYWORD_WEIGHT;
        if query.contains_phrase(&self.title) {
            score += TITLE_WEIGHT;
        }
        if query.contains_phrase(&self.category) {
            score += CATEGORY_WEIGHT;
        }
        let content_hits = query
            .distinct_tokens()
            .into_iter()
            .filter(|token| self.content_words.contains(*token))
            .count() as u64;
        score += content_hits * CONTENT_WORD_WEIGHT;

        score * u64::from(self.item.priority.max(1))
    }
}

/// A search hit with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: KnowledgeItem,
    pub score: u64,
}

/// One character's knowledge.
///
/// Searching takes `&self`; usage counters are atomic so a shared index can be searched
/// from several sessions at once.
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    items: Vec<IndexedItem>,

    /// Index: normalized keyword -> positions of items carrying it.
    keyword_to_items: HashMap<String, Vec<usize>>,

    searches: AtomicU64,
}

impl KnowledgeIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = KnowledgeItem>) -> Self {
        let mut index = Self::new();
        for item in items {
            index.add_item(item);
        }
        index
    }

    /// Add an item, replacing any item with the same ID.
    pub fn add_item(&mut self, item: KnowledgeItem) -> KnowledgeItemId {
        let id = item.id;
        if self.contains(id) {
            self.remove_item(id);
        }

        let position = self.items.len();
        for keyword in &item.keywords {
            let normalized = normalize(keyword);
            if !normalized.is_empty() {
                self.keyword_to_items.entry(normalized).or_default().push(position);
            }
        }

        self.items.push(IndexedItem {
            title: normalize(&item.title),
            category: normalize(&item.category),
            content_words: tokenize(&item.content).into_iter().collect(),
            usage: AtomicU64::new(item.usage_count),
            item,
        });
        id
    }

    /// Remove an item, returning its final state.
    pub fn remove_item(&mut self, id: KnowledgeItemId) -> Option<KnowledgeItem> {
        let position = self.items.iter().position(|entry| entry.item.id == id)?;
        let removed = self.items.remove(position).snapshot();
        self.rebuild_keyword_index();
        Some(removed)
    }

    fn rebuild_keyword_index(&mut self) {
        self.keyword_to_items.clear();
        for (position, entry) in self.items.iter().enumerate() {
            for keyword in &entry.item.keywords {
                let normalized = normalize(keyword);
                if !normalized.is_empty() {
                    self.keyword_to_items.entry(normalized).or_default().push(position);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: KnowledgeItemId) -> bool {
        self.items.iter().any(|entry| entry.item.id == id)
    }

    /// Get an item with its current usage count.
    pub fn get(&self, id: KnowledgeItemId) -> Option<KnowledgeItem> {
        self.items
            .iter()
            .find(|entry| entry.item.id == id)
            .map(IndexedItem::snapshot)
    }

    /// All items in insertion order, for persistence.
    pub fn items(&self) -> Vec<KnowledgeItem> {
        self.items.iter().map(IndexedItem::snapshot).collect()
    }

    /// All normalized keywords.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keyword_to_items.keys().map(String::as_str)
    }

    /// Items carrying a keyword (normalized before lookup).
    pub fn items_by_keyword(&self, keyword: &str) -> Vec<KnowledgeItem> {
        self.keyword_to_items
            .get(&normalize(keyword))
            .map(|positions| positions.iter().map(|&p| self.items[p].snapshot()).collect())
            .unwrap_or_default()
    }

    /// Number of searches executed (blank queries excluded).
    pub fn search_count(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// The index keywords mentioned in a text, normalized.
    ///
    /// These are the "topics" the session cache compares turns by. Does not count as a
    /// search.
    pub fn extract_topics(&self, text: &str) -> BTreeSet<String> {
        let query = QueryText::new(text);
        if query.is_blank() {
            return BTreeSet::new();
        }
        self.keyword_to_items
            .keys()
            .filter(|keyword| query.contains_keyword(keyword))
            .cloned()
            .collect()
    }

    /// Search and return items with their scores, best first.
    ///
    /// Ties break by priority, then insertion order. Returned items have their usage
    /// counted.
    pub fn scored_search(&self, query: &str, max_results: usize) -> Vec<ScoredItem> {
        let query = QueryText::new(query);
        if query.is_blank() || max_results == 0 {
            return Vec::new();
        }
        self.searches.fetch_add(1, Ordering::Relaxed);

        let mut scored: Vec<(usize, u64)> = self
            .items
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, entry.score(&query)))
            .filter(|(_, score)| *score > 0)
            .collect();

        scored.sort_by_key(|&(position, score)| {
            (
                Reverse(score),
                Reverse(self.items[position].item.priority),
                position,
            )
        });
        scored.truncate(max_results);

        debug!(
            tokens = query.tokens().len(),
            results = scored.len(),
            "knowledge search"
        );

        scored
            .into_iter()
            .map(|(position, score)| {
                let entry = &self.items[position];
                entry.usage.fetch_add(1, Ordering::Relaxed);
                ScoredItem {
                    item: entry.snapshot(),
                    score,
                }
            })
            .collect()
    }

    /// Search and return the best items.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<KnowledgeItem> {
        self.scored_search(query, max_results)
            .into_iter()
            .map(|scored| scored.item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn programming_index() -> KnowledgeIndex {
        KnowledgeIndex::from_items([
            KnowledgeItem::new("Variables", "A variable stores a value.")
                .with_keywords(["변수"])
                .with_category("programming"),
            KnowledgeItem::new("Functions", "A function groups reusable steps.")
                .with_keywords(["함수", "function"])
                .with_category("programming"),
        ])
    }

    #[test]
    fn test_keyword_with_particle_scores_ten() {
        let index = programming_index();
        let results = index.scored_search("변수가 뭔가요?", 5);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item.title, "Variables");
        assert_eq!(results[0].score, 10);
    }

    #[test]
    fn test_all_weights() {
        let index = KnowledgeIndex::from_items([KnowledgeItem::new(
            "Independence Movement",
            "The march began in Seoul.",
        )
        .with_keywords(["3·1 운동", "march"])
        .with_category("history")]);

        // keyword (10) + title (5) + category (3) + content words the/march/in/seoul (4)
        let results = index.scored_search(
            "independence movement history: the march in seoul",
            5,
        );
        assert_eq!(results[0].score, 10 + 5 + 3 + 4);
    }

    #[test]
    fn test_priority_multiplies_and_breaks_ties() {
        let index = KnowledgeIndex::from_items([
            KnowledgeItem::new("A", "x").with_keywords(["tea"]),
            KnowledgeItem::new("B", "y").with_keywords(["tea"]).with_priority(2),
            KnowledgeItem::new("C", "z").with_keywords(["tea"]),
        ]);

        let results = index.scored_search("tea please", 10);
        let titles: Vec<_> = results.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
        assert_eq!(results[0].score, 20);
        assert_eq!(results[1].score, 10);
    }

    #[test]
    fn test_zero_scores_excluded_and_truncated() {
        let index = programming_index();
        assert!(index.search("날씨 어때요", 5).is_empty());

        let index = KnowledgeIndex::from_items(
            (0..5).map(|i| KnowledgeItem::new(format!("T{i}"), "c").with_keywords(["tea"])),
        );
        assert_eq!(index.search("tea", 3).len(), 3);
    }

    #[test]
    fn test_blank_query_and_zero_max() {
        let index = programming_index();
        assert!(index.search("", 5).is_empty());
        assert!(index.search("   \n", 5).is_empty());
        assert!(index.search("변수", 0).is_empty());
        assert_eq!(index.search_count(), 0);
    }

    #[test]
    fn test_usage_counted() {
        let index = programming_index();
        index.search("변수", 5);
        let results = index.search("변수", 5);

        assert_eq!(results[0].usage_count, 2);
        assert_eq!(index.get(results[0].id).unwrap().usage_count, 2);
        assert_eq!(index.search_count(), 2);
    }

    #[test]
    fn test_extract_topics() {
        let index = programming_index();
        let topics = index.extract_topics("함수랑 변수 차이가 뭐야");
        assert_eq!(
            topics.into_iter().collect::<Vec<_>>(),
            vec!["변수".to_string(), "함수".to_string()]
        );
        assert!(index.extract_topics("네 좋아요").is_empty());
        assert_eq!(index.search_count(), 0);
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let mut index = programming_index();
        let item = KnowledgeItem::new("Loops", "Repeat").with_keywords(["loop"]);
        let id = index.add_item(item.clone());
        index.add_item(item.with_keywords(["반복"]));
        assert_eq!(index.len(), 3);
        assert_eq!(index.items_by_keyword("반복").len(), 1);

        let removed = index.remove_item(id).unwrap();
        assert_eq!(removed.title, "Loops");
        assert!(index.items_by_keyword("loop").is_empty());
        assert_eq!(index.items_by_keyword("함수")[0].title, "Functions");
    }
}
