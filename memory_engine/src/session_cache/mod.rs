//! Session Knowledge Cache - incremental knowledge retrieval per chat session.
//!
//! Each turn the user message is reduced to a topic set (the index keywords it mentions) and
//! compared with the topic sets already cached for the session:
//! - **Hit** (overlap above the hit threshold): cached items are reused, no search runs
//! - **Partial** (above the partial threshold): recent cached items blended with a few fresh ones
//! - **Miss**: a fresh search, cached under the new topic set
//!
//! A message that mentions no known topic continues the current topic and resolves as a hit
//! on the most recently used entries.

mod entry;

pub use entry::*;

use character_sim::{CharacterId, SessionId};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::knowledge_base::{KnowledgeItem, KnowledgeItemId, KnowledgeLibrary};
use crate::settings::CacheSettings;
use crate::store::{InMemoryStore, KeyValueStore};

/// How a turn's knowledge was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Partial,
    Miss,
}

impl std::fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheOutcome::Hit => write!(f, "hit"),
            CacheOutcome::Partial => write!(f, "partial"),
            CacheOutcome::Miss => write!(f, "miss"),
        }
    }
}

/// Knowledge resolved for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResolution {
    pub outcome: CacheOutcome,

    /// Best topic overlap found (0.0-1.0).
    pub overlap: f32,

    /// Topics extracted from the message.
    pub topics: BTreeSet<String>,

    pub items: Vec<KnowledgeItem>,
}

impl CacheResolution {
    fn empty() -> Self {
        Self {
            outcome: CacheOutcome::Miss,
            overlap: 0.0,
            topics: BTreeSet::new(),
            items: Vec::new(),
        }
    }
}

/// Per-session knowledge caches over a shared [`KnowledgeLibrary`].
#[derive(Debug)]
pub struct SessionKnowledgeCache<S = InMemoryStore<SessionId, SessionCache>> {
    library: KnowledgeLibrary,
    store: S,
    settings: CacheSettings,
}

impl SessionKnowledgeCache {
    /// Create a cache with in-memory session storage.
    pub fn new(library: KnowledgeLibrary, settings: CacheSettings) -> Self {
        Self::with_store(library, InMemoryStore::new(), settings)
    }

    pub fn with_defaults(library: KnowledgeLibrary) -> Self {
        Self::new(library, CacheSettings::default())
    }
}

impl<S: KeyValueStore<SessionId, SessionCache>> SessionKnowledgeCache<S> {
    pub fn with_store(library: KnowledgeLibrary, store: S, settings: CacheSettings) -> Self {
        Self {
            library,
            store,
            settings,
        }
    }

    pub fn library(&self) -> &KnowledgeLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut KnowledgeLibrary {
        &mut self.library
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Load a session's cache, starting over if it belongs to another character.
    fn load(&self, session_id: &SessionId, character_id: &CharacterId) -> SessionCache {
        match self.store.get(session_id) {
            Some(cache) if &cache.character_id == character_id => cache,
            Some(_) => {
                debug!(
                    session = %session_id,
                    character = %character_id,
                    "session switched character, cache reset"
                );
                SessionCache::new(session_id.clone(), character_id.clone())
            }
            None => SessionCache::new(session_id.clone(), character_id.clone()),
        }
    }

    /// Cache knowledge for every topic a text (usually the greeting) mentions.
    ///
    /// One entry per topic; topics already cached are skipped. Returns the number of entries
    /// added.
    pub fn seed(&mut self, session_id: &SessionId, text: &str, character_id: &CharacterId) -> usize {
        self.seed_at(session_id, text, character_id, Utc::now())
    }

    pub fn seed_at(
        &mut self,
        session_id: &SessionId,
        text: &str,
        character_id: &CharacterId,
        now: DateTime<Utc>,
    ) -> usize {
        let Some(index) = self.library.get(character_id) else {
            return 0;
        };
        let mut cache = self.load(session_id, character_id);

        let mut added = 0;
        for topic in index.extract_topics(text) {
            let keywords = BTreeSet::from([topic.clone()]);
            if cache.entry(&topic_key(&keywords)).is_some() {
                continue;
            }
            let items = index.search(&topic, self.settings.max_results_per_topic);
            cache
                .entries
                .push(SessionCacheEntry::new(keywords, items, now, cache.turn));
            added += 1;
        }

        debug!(session = %session_id, added, "seeded session cache");
        self.store.put(session_id.clone(), cache);
        added
    }

    /// Resolve the knowledge for a user message.
    pub fn resolve(
        &mut self,
        session_id: &SessionId,
        user_message: &str,
        character_id: &CharacterId,
    ) -> CacheResolution {
        self.resolve_at(session_id, user_message, character_id, Utc::now())
    }

    pub fn resolve_at(
        &mut self,
        session_id: &SessionId,
        user_message: &str,
        character_id: &CharacterId,
        now: DateTime<Utc>,
    ) -> CacheResolution {
        let Some(index) = self.library.get(character_id) else {
            debug!(character = %character_id, "no knowledge for character");
            return CacheResolution::empty();
        };
        let mut cache = self.load(session_id, character_id);

        cache.turn += 1;
        let turn = cache.turn;
        for entry in &mut cache.entries {
            entry.relevance *= self.settings.relevance_decay;
        }

        let topics = index.extract_topics(user_message);
        let resolution = if topics.is_empty() {
            Self::continue_topic(&mut cache, turn)
        } else {
            let best = best_match(&cache.entries, &topics);
            let overlap = best.as_ref().map_or(0.0, |(_, overlap)| *overlap);

            match best {
                Some((positions, overlap)) if overlap > self.settings.hit_threshold => {
                    let mut items = Vec::new();
                    let mut seen = HashSet::new();
                    for position in positions {
                        let entry = &mut cache.entries[position];
                        entry.touch(turn);
                        items.extend(entry.items.iter().filter(|i| seen.insert(i.id)).cloned());
                    }
                    CacheResolution {
                        outcome: CacheOutcome::Hit,
                        overlap,
                        topics,
                        items,
                    }
                }
                Some(_) if overlap > self.settings.partial_threshold => {
                    let mut items = recent_items(&cache.entries, self.settings.partial_cached_items);
                    let mut seen: HashSet<KnowledgeItemId> = items.iter().map(|i| i.id).collect();
                    let fresh = index
                        .search(user_message, self.settings.max_results_per_topic)
                        .into_iter()
                        .filter(|item| seen.insert(item.id))
                        .take(self.settings.partial_fresh_items);
                    items.extend(fresh);
                    CacheResolution {
                        outcome: CacheOutcome::Partial,
                        overlap,
                        topics,
                        items,
                    }
                }
                _ => {
                    let items = index.search(user_message, self.settings.max_results_per_topic);
                    cache.entries.push(SessionCacheEntry::new(
                        topics.clone(),
                        items.clone(),
                        now,
                        turn,
                    ));
                    CacheResolution {
                        outcome: CacheOutcome::Miss,
                        overlap,
                        topics,
                        items,
                    }
                }
            }
        };

        debug!(
            session = %session_id,
            outcome = %resolution.outcome,
            overlap = resolution.overlap,
            items = resolution.items.len(),
            "resolved session knowledge"
        );
        self.store.put(session_id.clone(), cache);
        resolution
    }

    /// Reuse the most recently used entries for a message without topics.
    fn continue_topic(cache: &mut SessionCache, turn: u64) -> CacheResolution {
        let Some(latest) = cache.entries.iter().map(|e| e.last_used_turn).max() else {
            return CacheResolution::empty();
        };

        let mut items = Vec::new();
        let mut seen = HashSet::new();
        for entry in cache
            .entries
            .iter_mut()
            .filter(|e| e.last_used_turn == latest)
        {
            entry.touch(turn);
            items.extend(entry.items.iter().filter(|i| seen.insert(i.id)).cloned());
        }

        CacheResolution {
            outcome: CacheOutcome::Hit,
            overlap: 1.0,
            topics: BTreeSet::new(),
            items,
        }
    }

    /// Drop a session's cache.
    pub fn reset(&mut self, session_id: &SessionId) -> Option<SessionCache> {
        self.store.delete(session_id)
    }

    /// Snapshot of a session's cache.
    pub fn session(&self, session_id: &SessionId) -> Option<SessionCache> {
        self.store.get(session_id)
    }

    /// Put back a previously saved session cache.
    pub fn restore(&mut self, cache: SessionCache) {
        self.store.put(cache.session_id.clone(), cache);
    }

    pub fn cached_topics(&self, session_id: &SessionId) -> Vec<String> {
        self.store
            .get(session_id)
            .map(|cache| cache.topics())
            .unwrap_or_default()
    }
}

/// Entries matching a topic set, with their overlap.
///
/// The best single entry competes with the union of every entry sharing a topic with the
/// message, so topics cached separately (one entry per greeting topic) can still hit together.
/// Single-entry ties go to higher relevance, then the newer entry.
fn best_match(
    entries: &[SessionCacheEntry],
    topics: &BTreeSet<String>,
) -> Option<(Vec<usize>, f32)> {
    let (single, single_overlap) = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| (position, jaccard(&entry.keywords, topics)))
        .max_by(|(a_pos, a), (b_pos, b)| {
            a.partial_cmp(b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    entries[*a_pos]
                        .relevance
                        .partial_cmp(&entries[*b_pos].relevance)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a_pos.cmp(b_pos))
        })?;

    let covering: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.keywords.is_disjoint(topics))
        .map(|(position, _)| position)
        .collect();
    let covered: BTreeSet<String> = covering
        .iter()
        .flat_map(|&position| entries[position].keywords.iter().cloned())
        .collect();
    let covering_overlap = jaccard(&covered, topics);

    if covering.len() > 1 && covering_overlap > single_overlap {
        Some((covering, covering_overlap))
    } else {
        Some((vec![single], single_overlap))
    }
}

/// The newest cached items, newest entry first, without duplicates.
fn recent_items(entries: &[SessionCacheEntry], count: usize) -> Vec<KnowledgeItem> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .rev()
        .flat_map(|entry| entry.items.iter())
        .filter(|item| seen.insert(item.id))
        .take(count)
        .cloned()
        .collect()
}
