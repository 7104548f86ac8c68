//! Memory Update Engine - applies a completed turn to a core memory.
//!
//! Order of a turn:
//! 1. Reconcile the memory with the current config
//! 2. Apply every event trigger whose keywords occur in the turn
//! 3. Achieve milestones whose conditions now hold (against the updated statuses)
//! 4. Count the conversation

use character_sim::{CoreMemory, Event, MilestoneDef, SimulationConfig};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{KeywordMatcher, TurnMatcher};
use crate::conversation::ChatMessage;

/// What a turn changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Names of the triggers that fired.
    pub triggered: Vec<String>,

    /// Ids of the milestones achieved this turn.
    pub achieved: Vec<String>,

    /// Events appended to the log, in order.
    pub events: Vec<Event>,

    /// Conversation count after the turn.
    pub conversation_count: u64,
}

impl TurnOutcome {
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }
}

/// Applies triggers and milestones to core memories.
pub struct MemoryUpdateEngine {
    matcher: Box<dyn TurnMatcher>,
}

impl std::fmt::Debug for MemoryUpdateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUpdateEngine").finish_non_exhaustive()
    }
}

impl Default for MemoryUpdateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUpdateEngine {
    /// Create an engine using [`KeywordMatcher`].
    pub fn new() -> Self {
        Self::with_matcher(KeywordMatcher)
    }

    pub fn with_matcher(matcher: impl TurnMatcher + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
        }
    }

    /// Apply a finished exchange to the memory.
    pub fn apply_turn(
        &self,
        memory: &mut CoreMemory,
        config: &SimulationConfig,
        user_message: &str,
        assistant_message: &str,
    ) -> TurnOutcome {
        self.apply_turn_at(memory, config, user_message, assistant_message, Utc::now())
    }

    pub fn apply_turn_at(
        &self,
        memory: &mut CoreMemory,
        config: &SimulationConfig,
        user_message: &str,
        assistant_message: &str,
        now: DateTime<Utc>,
    ) -> TurnOutcome {
        memory.reconcile(config);

        let turn_text = format!("{user_message}\n{assistant_message}");
        let mut outcome = TurnOutcome::default();

        for trigger in &config.event_trigger_defs {
            let fired = trigger
                .trigger_keywords
                .iter()
                .any(|keyword| self.matcher.matches(&turn_text, keyword));
            if fired {
                let event = memory.apply_trigger(trigger, now).clone();
                debug!(trigger = %trigger.name, impact = ?event.impact, "event trigger fired");
                outcome.triggered.push(trigger.name.clone());
                outcome.events.push(event);
            }
        }

        for def in &config.milestone_defs {
            let pending = memory.milestone(&def.id).is_some_and(|m| !m.achieved());
            if !pending || !self.milestone_satisfied(def, memory, &turn_text) {
                continue;
            }
            let Some(event) = memory.achieve_milestone(&def.id, now).cloned() else {
                continue;
            };
            info!(memory = %memory.key(), milestone = %def.id, "milestone achieved");
            outcome.events.push(event);
            outcome.achieved.push(def.id.clone());
        }

        memory.conversation_count += 1;
        memory.updated_at = memory.updated_at.max(now);
        outcome.conversation_count = memory.conversation_count;
        outcome
    }

    /// Whether a milestone's conditions hold.
    ///
    /// Satisfied when any keyword occurs in the turn, or when every threshold holds.
    /// An empty keyword list or an empty threshold list never satisfies on its own.
    pub fn milestone_satisfied(
        &self,
        def: &MilestoneDef,
        memory: &CoreMemory,
        turn_text: &str,
    ) -> bool {
        let keywords_hold = def
            .condition_keywords
            .iter()
            .any(|keyword| self.matcher.matches(turn_text, keyword));

        let thresholds_hold = !def.thresholds.is_empty()
            && def.thresholds.iter().all(|threshold| {
                memory
                    .status_value(&threshold.stat)
                    .is_some_and(|value| threshold.comparison.holds(value, threshold.value))
            });

        keywords_hold || thresholds_hold
    }

    /// The request to send to the language model to compress the conversation so far.
    ///
    /// `None` when the character has no compression prompt or there is nothing to compress.
    pub fn compression_request(
        &self,
        config: &SimulationConfig,
        memory: &CoreMemory,
        history: &[ChatMessage],
    ) -> Option<String> {
        let instructions = config.compression_prompt.trim();
        if instructions.is_empty() || history.is_empty() {
            return None;
        }

        let mut request = String::from(instructions);
        if let Some(previous) = memory.compressed_history.as_deref() {
            request.push_str("\n\n## Previous Summary\n");
            request.push_str(previous);
        }
        request.push_str("\n\n## Conversation\n");
        let lines: Vec<String> = history.iter().map(ChatMessage::render_line).collect();
        request.push_str(&lines.join("\n"));
        Some(request)
    }

    /// Store the model's summary as the compressed history.
    pub fn record_compression(&self, memory: &mut CoreMemory, summary: &str) {
        let summary = summary.trim();
        memory.compressed_history = (!summary.is_empty()).then(|| summary.to_string());
        memory.updated_at = memory.updated_at.max(Utc::now());
    }
}
