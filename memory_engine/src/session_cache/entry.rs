//! Cached topics of one session.

use character_sim::{CharacterId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::knowledge_base::KnowledgeItem;

/// Canonical key of a topic set: sorted keywords joined by `", "`.
pub fn topic_key(keywords: &BTreeSet<String>) -> String {
    keywords.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Jaccard similarity of two keyword sets; 0.0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Knowledge retrieved for one topic set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCacheEntry {
    pub topic: String,
    pub keywords: BTreeSet<String>,
    pub items: Vec<KnowledgeItem>,
    pub cached_at: DateTime<Utc>,

    /// Times this entry was reused on a hit.
    pub usage_count: u64,

    /// 1.0 when cached or reused, decayed every turn.
    pub relevance: f32,

    /// Turn at which the entry was cached or last reused.
    pub last_used_turn: u64,
}

impl SessionCacheEntry {
    pub fn new(
        keywords: BTreeSet<String>,
        items: Vec<KnowledgeItem>,
        cached_at: DateTime<Utc>,
        turn: u64,
    ) -> Self {
        Self {
            topic: topic_key(&keywords),
            keywords,
            items,
            cached_at,
            usage_count: 0,
            relevance: 1.0,
            last_used_turn: turn,
        }
    }

    pub(crate) fn touch(&mut self, turn: u64) {
        self.usage_count += 1;
        self.relevance = 1.0;
        self.last_used_turn = turn;
    }
}

/// The knowledge cache of one chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCache {
    pub session_id: SessionId,
    pub character_id: CharacterId,

    /// Entries in the order they were cached.
    pub entries: Vec<SessionCacheEntry>,

    /// Number of resolved turns.
    pub turn: u64,
}

impl SessionCache {
    pub fn new(session_id: SessionId, character_id: CharacterId) -> Self {
        Self {
            session_id,
            character_id,
            entries: Vec::new(),
            turn: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, topic: &str) -> Option<&SessionCacheEntry> {
        self.entries.iter().find(|e| e.topic == topic)
    }

    pub fn topics(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.topic.clone()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
