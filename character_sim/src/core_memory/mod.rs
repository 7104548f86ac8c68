//! Core memory - the persistent per-user, per-character state driven by a [`SimulationConfig`].

mod milestone;
mod status;

pub use milestone::*;
pub use status::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::identity::{CharacterId, MemoryKey, UserId};
use crate::simulation::{sum_deltas, EventTriggerDef, SimulationConfig, StatDelta};

/// Errors from loading or saving a core memory snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("core memory snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Core memory of one (user, character) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreMemory {
    pub user_id: UserId,
    pub character_id: CharacterId,

    /// Status values by name.
    pub status_values: BTreeMap<String, StatusValue>,

    pub milestones: Vec<Milestone>,

    /// Append-only log; use [`CoreMemory::record_event`].
    event_log: Vec<Event>,

    pub persistent_facts: BTreeSet<String>,

    /// Latest string-valued impacts, e.g. `mood -> happy`.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Summary produced by running the compression prompt through the language model.
    #[serde(default)]
    pub compressed_history: Option<String>,

    pub conversation_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoreMemory {
    /// Create a fresh memory with every status at its configured default.
    pub fn from_config(
        user_id: UserId,
        character_id: CharacterId,
        config: &SimulationConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut memory = Self {
            user_id,
            character_id,
            status_values: BTreeMap::new(),
            milestones: Vec::new(),
            event_log: Vec::new(),
            persistent_facts: BTreeSet::new(),
            labels: BTreeMap::new(),
            compressed_history: None,
            conversation_count: 0,
            created_at: now,
            updated_at: now,
        };
        memory.reconcile(config);
        memory
    }

    pub fn key(&self) -> MemoryKey {
        MemoryKey::new(self.user_id.clone(), self.character_id.clone())
    }

    /// Add statuses and milestones the config gained since this memory was created.
    ///
    /// Existing values are left untouched. Returns whether anything was added.
    pub fn reconcile(&mut self, config: &SimulationConfig) -> bool {
        let mut changed = false;
        for def in &config.status_defs {
            if !self.status_values.contains_key(&def.name) {
                self.status_values
                    .insert(def.name.clone(), StatusValue::from_def(def));
                changed = true;
            }
        }
        for def in &config.milestone_defs {
            if self.milestone(&def.id).is_none() {
                self.milestones.push(Milestone::from_def(def));
                changed = true;
            }
        }
        changed
    }

    pub fn status(&self, name: &str) -> Option<&StatusValue> {
        self.status_values.get(name)
    }

    pub fn status_value(&self, name: &str) -> Option<f64> {
        self.status(name).map(StatusValue::current)
    }

    /// Apply deltas as one change: deltas are summed per status and clamped once.
    ///
    /// Unknown statuses are ignored. Returns the change actually applied per status.
    pub fn apply_deltas(&mut self, deltas: &[StatDelta]) -> BTreeMap<String, f64> {
        let mut applied = BTreeMap::new();
        for (stat, delta) in sum_deltas(deltas) {
            if let Some(status) = self.status_values.get_mut(&stat) {
                applied.insert(stat, status.apply(delta));
            }
        }
        applied
    }

    /// Apply an event trigger: deltas, labels and an event log entry.
    pub fn apply_trigger(&mut self, trigger: &EventTriggerDef, at: DateTime<Utc>) -> &Event {
        let impact = self.apply_deltas(&trigger.impact);
        self.labels.extend(trigger.labels.clone());
        self.record_event(Event {
            timestamp: at,
            kind: EventKind::Trigger,
            description: trigger.name.clone(),
            impact,
            labels: trigger.labels.clone(),
        })
    }

    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    pub fn achieved_milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.iter().filter(|m| m.achieved())
    }

    /// Achieve a milestone and grant its rewards.
    ///
    /// Returns `None` when the milestone is unknown or already achieved, so rewards are
    /// granted at most once over the memory's lifetime.
    pub fn achieve_milestone(&mut self, id: &str, at: DateTime<Utc>) -> Option<&Event> {
        let milestone = self.milestones.iter_mut().find(|m| m.id == id)?;
        if !milestone.achieve(at) {
            return None;
        }
        let rewards: Vec<StatDelta> = milestone
            .reward_deltas
            .iter()
            .map(|(stat, delta)| StatDelta::new(stat.clone(), *delta))
            .collect();
        let description = milestone.description.clone();

        let impact = self.apply_deltas(&rewards);
        Some(self.record_event(Event {
            timestamp: at,
            kind: EventKind::Milestone,
            description,
            impact,
            labels: BTreeMap::new(),
        }))
    }

    pub fn record_event(&mut self, event: Event) -> &Event {
        self.updated_at = self.updated_at.max(event.timestamp);
        self.event_log.push(event);
        &self.event_log[self.event_log.len() - 1]
    }

    pub fn event_log(&self) -> &[Event] {
        &self.event_log
    }

    /// The most recent events, oldest first.
    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.event_log.len().saturating_sub(count);
        &self.event_log[start..]
    }

    /// Remember a fact. Returns `false` for blank or already-known facts.
    pub fn remember_fact(&mut self, fact: impl Into<String>) -> bool {
        let fact = fact.into().trim().to_string();
        !fact.is_empty() && self.persistent_facts.insert(fact)
    }

    pub fn forget_fact(&mut self, fact: &str) -> bool {
        self.persistent_facts.remove(fact.trim())
    }

    /// Whether every status value sits inside its bounds.
    pub fn within_bounds(&self) -> bool {
        self.status_values.values().all(StatusValue::in_bounds)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a snapshot; status values are normalized in case the stored copy was edited.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let mut memory: CoreMemory = serde_json::from_str(json)?;
        for status in memory.status_values.values_mut() {
            status.normalize();
        }
        Ok(memory)
    }
}
