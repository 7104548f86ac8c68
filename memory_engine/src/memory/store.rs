//! Core memory storage keyed by (user, character).

use character_sim::{CharacterId, CoreMemory, MemoryKey, SimulationConfig, UserId};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::store::{InMemoryStore, KeyValueStore};

/// Loads, creates and saves core memories.
#[derive(Debug, Default)]
pub struct MemoryStore<S = InMemoryStore<MemoryKey, CoreMemory>> {
    store: S,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: KeyValueStore<MemoryKey, CoreMemory>> MemoryStore<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Get the memory of a pair, creating it from the config on first contact.
    ///
    /// An existing memory is returned unchanged.
    pub fn initialize(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        config: &SimulationConfig,
    ) -> CoreMemory {
        self.initialize_at(user_id, character_id, config, Utc::now())
    }

    pub fn initialize_at(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        config: &SimulationConfig,
        now: DateTime<Utc>,
    ) -> CoreMemory {
        let key = MemoryKey::new(user_id.clone(), character_id.clone());
        if let Some(existing) = self.store.get(&key) {
            return existing;
        }

        let memory = CoreMemory::from_config(user_id.clone(), character_id.clone(), config, now);
        info!(memory = %key, statuses = memory.status_values.len(), "created core memory");
        self.store.put(key, memory.clone());
        memory
    }

    pub fn get(&self, user_id: &UserId, character_id: &CharacterId) -> Option<CoreMemory> {
        self.store
            .get(&MemoryKey::new(user_id.clone(), character_id.clone()))
    }

    pub fn save(&mut self, memory: CoreMemory) {
        self.store.put(memory.key(), memory);
    }

    pub fn delete(&mut self, user_id: &UserId, character_id: &CharacterId) -> Option<CoreMemory> {
        self.store
            .delete(&MemoryKey::new(user_id.clone(), character_id.clone()))
    }

    /// JSON snapshot of a pair's memory, for the caller to persist.
    pub fn export(&self, user_id: &UserId, character_id: &CharacterId) -> Result<Option<String>> {
        match self.get(user_id, character_id) {
            Some(memory) => Ok(Some(memory.to_json()?)),
            None => Ok(None),
        }
    }

    /// Load a JSON snapshot, replacing any memory stored for the same pair.
    pub fn import(&mut self, json: &str) -> Result<CoreMemory> {
        let memory = CoreMemory::from_json(json)?;
        info!(memory = %memory.key(), "imported core memory");
        self.save(memory.clone());
        Ok(memory)
    }

    /// Add a persistent fact. Returns `false` if the memory does not exist or already knew it.
    pub fn remember_fact(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        fact: &str,
    ) -> bool {
        self.modify(user_id, character_id, |memory| memory.remember_fact(fact))
    }

    pub fn forget_fact(&mut self, user_id: &UserId, character_id: &CharacterId, fact: &str) -> bool {
        self.modify(user_id, character_id, |memory| memory.forget_fact(fact))
    }

    fn modify(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        change: impl FnOnce(&mut CoreMemory) -> bool,
    ) -> bool {
        let Some(mut memory) = self.get(user_id, character_id) else {
            return false;
        };
        let changed = change(&mut memory);
        if changed {
            memory.updated_at = Utc::now().max(memory.updated_at);
            self.save(memory);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use character_sim::StatusDef;

    fn config() -> SimulationConfig {
        SimulationConfig {
            status_defs: vec![StatusDef::new("affection", 0.0, 100.0).with_default(50.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut store = MemoryStore::new();
        let (user, character) = (UserId::new("u1"), CharacterId::new("c1"));

        let mut memory = store.initialize(&user, &character, &config());
        assert_eq!(memory.status_value("affection"), Some(50.0));

        memory.status_values.get_mut("affection").unwrap().set(80.0);
        store.save(memory);

        let again = store.initialize(&user, &character, &config());
        assert_eq!(again.status_value("affection"), Some(80.0));
    }

    #[test]
    fn test_pairs_are_independent() {
        let mut store = MemoryStore::new();
        let config = config();
        store.initialize(&"u1".into(), &"c1".into(), &config);
        store.initialize(&"u1".into(), &"c2".into(), &config);

        assert!(store.get(&"u1".into(), &"c1".into()).is_some());
        assert!(store.get(&"u2".into(), &"c1".into()).is_none());
        assert!(store.delete(&"u1".into(), &"c1".into()).is_some());
        assert!(store.get(&"u1".into(), &"c2".into()).is_some());
    }

    #[test]
    fn test_export_import() {
        let mut store = MemoryStore::new();
        let (user, character) = (UserId::new("u1"), CharacterId::new("c1"));
        assert!(store.export(&user, &character).unwrap().is_none());

        store.initialize(&user, &character, &config());
        store.remember_fact(&user, &character, "likes tea");
        let json = store.export(&user, &character).unwrap().unwrap();

        let mut other = MemoryStore::new();
        let imported = other.import(&json).unwrap();
        assert_eq!(Some(imported), store.get(&user, &character));
        assert!(other.get(&user, &character).is_some());

        let result = other.import("{\"user_id\": 1}");
        assert!(matches!(result, Err(EngineError::Snapshot(_))));
    }

    #[test]
    fn test_facts() {
        let mut store = MemoryStore::new();
        let (user, character) = (UserId::new("u1"), CharacterId::new("c1"));

        assert!(!store.remember_fact(&user, &character, "likes tea"));
        store.initialize(&user, &character, &config());

        assert!(store.remember_fact(&user, &character, "likes tea"));
        assert!(!store.remember_fact(&user, &character, "likes tea"));
        let memory = store.get(&user, &character).unwrap();
        assert!(memory.persistent_facts.contains("likes tea"));

        assert!(store.forget_fact(&user, &character, "likes tea"));
        assert!(store.get(&user, &character).unwrap().persistent_facts.is_empty());
    }
}
