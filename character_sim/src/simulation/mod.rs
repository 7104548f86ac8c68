//! Simulation configuration - the character author's rules for status values, milestones and
//! event triggers.
//!
//! Authors write the configuration as plain text (see [`parse`]); the parsed form is immutable
//! and only rebuilt when the author edits the text.

mod parser;
mod writer;

pub use parser::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Definition of a numeric status value, e.g. `affection: 0-100, default=50`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDef {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub description: String,
}

impl StatusDef {
    /// Create a definition whose default is the lower bound.
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default: min,
            description: String::new(),
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Clamp a value into this definition's range.
    pub fn clamp(&self, value: f64) -> f64 {
        let (min, max) = ordered_bounds(self.min, self.max);
        value.clamp(min, max)
    }
}

/// Put two bounds in order. A NaN bound collapses onto the other one; two NaN bounds become 0.
pub fn ordered_bounds(a: f64, b: f64) -> (f64, f64) {
    let (min, max) = (a.min(b), a.max(b));
    if min.is_nan() {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// A single additive change to a status value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatDelta {
    pub stat: String,
    pub delta: f64,
}

impl StatDelta {
    pub fn new(stat: impl Into<String>, delta: f64) -> Self {
        Self {
            stat: stat.into(),
            delta,
        }
    }
}

/// Sum a list of deltas per stat. A reward of `stat+20, stat-5` nets `+15`.
pub fn sum_deltas(deltas: &[StatDelta]) -> BTreeMap<String, f64> {
    let mut summed = BTreeMap::new();
    for d in deltas {
        *summed.entry(d.stat.clone()).or_insert(0.0) += d.delta;
    }
    summed
}

/// Comparison operators usable in milestone thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    AtLeast,
    AtMost,
    Above,
    Below,
    Equal,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::AtMost => "<=",
            Comparison::Above => ">",
            Comparison::Below => "<",
            Comparison::Equal => "=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">=" => Some(Comparison::AtLeast),
            "<=" => Some(Comparison::AtMost),
            ">" => Some(Comparison::Above),
            "<" => Some(Comparison::Below),
            "=" | "==" => Some(Comparison::Equal),
            _ => None,
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::AtLeast => lhs >= rhs,
            Comparison::AtMost => lhs <= rhs,
            Comparison::Above => lhs > rhs,
            Comparison::Below => lhs < rhs,
            Comparison::Equal => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

/// A status threshold condition such as `affection>=80`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub stat: String,
    pub comparison: Comparison,
    pub value: f64,
}

impl Threshold {
    pub fn new(stat: impl Into<String>, comparison: Comparison, value: f64) -> Self {
        Self {
            stat: stat.into(),
            comparison,
            value,
        }
    }
}

/// A one-time achievable milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDef {
    pub id: String,
    pub description: String,
    /// Any of these appearing in the turn text satisfies the milestone.
    pub condition_keywords: Vec<String>,
    /// All of these holding against current status values satisfies the milestone.
    pub thresholds: Vec<Threshold>,
    pub reward_deltas: Vec<StatDelta>,
}

impl MilestoneDef {
    /// Create a milestone whose only condition is its own id, read as a phrase.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            condition_keywords: vec![implicit_keyword(&id)],
            id,
            description: description.into(),
            thresholds: Vec::new(),
            reward_deltas: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.condition_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_reward(mut self, stat: impl Into<String>, delta: f64) -> Self {
        self.reward_deltas.push(StatDelta::new(stat, delta));
        self
    }

    /// Whether the condition keywords are the ones derived from the id.
    pub fn has_implicit_condition(&self) -> bool {
        self.thresholds.is_empty() && self.condition_keywords == [implicit_keyword(&self.id)]
    }
}

/// A keyword-driven event trigger, e.g. `compliment|praise -> affection+5, mood="happy"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTriggerDef {
    /// The trigger name as written by the author.
    pub name: String,
    pub trigger_keywords: Vec<String>,
    pub impact: Vec<StatDelta>,
    /// String-valued impacts, kept apart from the numeric deltas.
    pub labels: BTreeMap<String, String>,
}

impl EventTriggerDef {
    /// Create a trigger; keywords are derived from the `|`-separated name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            trigger_keywords: trigger_keywords(&name),
            name,
            impact: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_delta(mut self, stat: impl Into<String>, delta: f64) -> Self {
        self.impact.push(StatDelta::new(stat, delta));
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// The parsed simulation configuration of one character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Status definitions in authoring order; names are unique.
    pub status_defs: Vec<StatusDef>,
    pub milestone_defs: Vec<MilestoneDef>,
    pub event_trigger_defs: Vec<EventTriggerDef>,
    pub compression_prompt: String,
    pub injection_template: String,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a status definition by name.
    pub fn status_def(&self, name: &str) -> Option<&StatusDef> {
        self.status_defs.iter().find(|d| d.name == name)
    }

    pub fn has_status(&self, name: &str) -> bool {
        self.status_def(name).is_some()
    }

    pub fn milestone_def(&self, id: &str) -> Option<&MilestoneDef> {
        self.milestone_defs.iter().find(|m| m.id == id)
    }

    /// True when nothing at all was configured.
    pub fn is_empty(&self) -> bool {
        self.status_defs.is_empty()
            && self.milestone_defs.is_empty()
            && self.event_trigger_defs.is_empty()
            && self.compression_prompt.is_empty()
            && self.injection_template.is_empty()
    }

    /// Serialize back into the authoring grammar accepted by [`parse`].
    pub fn to_config_text(&self) -> String {
        writer::write_config(self)
    }
}

/// The keyword a milestone matches when the author gives no `when` clause.
pub(crate) fn implicit_keyword(id: &str) -> String {
    id.replace('_', " ")
}

/// Keywords of a trigger name: `|` separates alternatives, `_` reads as a space.
pub(crate) fn trigger_keywords(name: &str) -> Vec<String> {
    name.split('|')
        .map(|alt| alt.trim().replace('_', " "))
        .filter(|alt| !alt.is_empty())
        .collect()
}
