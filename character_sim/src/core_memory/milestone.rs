//! Milestones and the append-only event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::simulation::{sum_deltas, MilestoneDef};

/// Runtime state of a milestone. Achieving it is a one-way transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub description: String,
    pub reward_deltas: BTreeMap<String, f64>,
    achieved: bool,
    achieved_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn from_def(def: &MilestoneDef) -> Self {
        Self {
            id: def.id.clone(),
            description: def.description.clone(),
            reward_deltas: sum_deltas(&def.reward_deltas),
            achieved: false,
            achieved_at: None,
        }
    }

    pub fn achieved(&self) -> bool {
        self.achieved
    }

    pub fn achieved_at(&self) -> Option<DateTime<Utc>> {
        self.achieved_at
    }

    /// Mark the milestone achieved. Returns `false` if it already was.
    pub(crate) fn achieve(&mut self, at: DateTime<Utc>) -> bool {
        if self.achieved {
            return false;
        }
        self.achieved = true;
        self.achieved_at = Some(at);
        true
    }
}

/// What produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A configured event trigger matched the turn.
    Trigger,
    /// A milestone was achieved.
    Milestone,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Trigger => write!(f, "trigger"),
            EventKind::Milestone => write!(f, "milestone"),
        }
    }
}

/// An entry of the event log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub description: String,
    /// Change actually applied per status, after clamping.
    pub impact: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
