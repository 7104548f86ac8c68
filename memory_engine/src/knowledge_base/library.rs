//! Knowledge indexes for every character.

use character_sim::CharacterId;
use std::collections::HashMap;
use std::sync::Arc;

use super::{KnowledgeIndex, KnowledgeItem};

/// Per-character knowledge indexes, shared with the sessions searching them.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeLibrary {
    indexes: HashMap<CharacterId, Arc<KnowledgeIndex>>,
}

impl KnowledgeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a character's index, returning the previous one.
    pub fn insert(
        &mut self,
        character_id: CharacterId,
        index: KnowledgeIndex,
    ) -> Option<Arc<KnowledgeIndex>> {
        self.indexes.insert(character_id, Arc::new(index))
    }

    /// Build and install an index from items.
    pub fn insert_items(
        &mut self,
        character_id: CharacterId,
        items: impl IntoIterator<Item = KnowledgeItem>,
    ) {
        self.insert(character_id, KnowledgeIndex::from_items(items));
    }

    pub fn get(&self, character_id: &CharacterId) -> Option<Arc<KnowledgeIndex>> {
        self.indexes.get(character_id).cloned()
    }

    pub fn remove(&mut self, character_id: &CharacterId) -> Option<Arc<KnowledgeIndex>> {
        self.indexes.remove(character_id)
    }

    pub fn contains(&self, character_id: &CharacterId) -> bool {
        self.indexes.contains_key(character_id)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_index_counts_usage() {
        let mut library = KnowledgeLibrary::new();
        let teacher = CharacterId::new("teacher");
        library.insert_items(
            teacher.clone(),
            [KnowledgeItem::new("Variables", "stores values").with_keyword("변수")],
        );

        let first = library.get(&teacher).unwrap();
        let second = library.get(&teacher).unwrap();
        first.search("변수", 1);
        second.search("변수", 1);

        assert_eq!(first.search_count(), 2);
        assert!(library.contains(&teacher));
        assert!(library.get(&CharacterId::new("nobody")).is_none());
    }
}
