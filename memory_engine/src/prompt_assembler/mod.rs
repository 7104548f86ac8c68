//! Prompt Assembler - builds the model prompt in three tiers.
//!
//! Tiers are ordered from least to most volatile so a provider's prompt cache can reuse the
//! longest possible prefix between turns:
//! 1. **Stable**: identity, output format, knowledge and the rendered memory
//! 2. **History**: the recent conversation window
//! 3. **Current**: the user's message, always last
//!
//! When a token budget is set, the oldest history lines are dropped until the estimate fits.

mod budget;
mod template;

pub use budget::*;
pub use template::*;

use character_sim::CoreMemory;
use tracing::{debug, warn};

use crate::conversation::ChatMessage;
use crate::knowledge_base::KnowledgeItem;
use crate::settings::PromptSettings;

/// Volatility tier of a prompt section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Stable,
    History,
    Current,
}

/// A titled block of the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSection {
    pub tier: Tier,
    pub title: String,
    pub body: String,
}

impl PromptSection {
    pub fn new(tier: Tier, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tier,
            title: title.into(),
            body: body.into(),
        }
    }

    fn render(&self) -> String {
        format!("## {}\n{}\n\n", self.title, self.body)
    }
}

/// Everything a turn's prompt is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptRequest<'a> {
    /// The character's identity / system prompt.
    pub character_prompt: &'a str,
    pub knowledge: &'a [KnowledgeItem],
    pub memory: Option<&'a CoreMemory>,
    pub injection_template: &'a str,
    /// Full conversation so far, oldest first.
    pub history: &'a [ChatMessage],
    pub current_input: &'a str,
}

impl<'a> PromptRequest<'a> {
    pub fn new(current_input: &'a str) -> Self {
        Self {
            current_input,
            ..Default::default()
        }
    }

    pub fn with_character_prompt(mut self, character_prompt: &'a str) -> Self {
        self.character_prompt = character_prompt;
        self
    }

    pub fn with_knowledge(mut self, knowledge: &'a [KnowledgeItem]) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Attach the core memory and the template it is rendered with.
    pub fn with_memory(mut self, memory: &'a CoreMemory, injection_template: &'a str) -> Self {
        self.memory = Some(memory);
        self.injection_template = injection_template;
        self
    }

    pub fn with_history(mut self, history: &'a [ChatMessage]) -> Self {
        self.history = history;
        self
    }
}

/// The assembled prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// Sections in tier order.
    sections: Vec<PromptSection>,

    /// Estimated tokens of [`AssembledPrompt::to_prompt_string`].
    pub estimated_tokens: usize,

    /// History messages dropped to fit the token budget.
    pub dropped_history: usize,
}

impl AssembledPrompt {
    pub fn sections(&self) -> &[PromptSection] {
        &self.sections
    }

    pub fn section(&self, title: &str) -> Option<&PromptSection> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Rendered text of one tier.
    pub fn tier_text(&self, tier: Tier) -> String {
        self.sections
            .iter()
            .filter(|s| s.tier == tier)
            .map(PromptSection::render)
            .collect()
    }

    /// Format the prompt as a single string.
    pub fn to_prompt_string(&self) -> String {
        self.sections.iter().map(PromptSection::render).collect()
    }
}

pub const IDENTITY_TITLE: &str = "Character";
pub const FORMAT_TITLE: &str = "Response Format";
pub const KNOWLEDGE_TITLE: &str = "Relevant Knowledge";
pub const MEMORY_TITLE: &str = "Memory";
pub const HISTORY_TITLE: &str = "Conversation History";
pub const CURRENT_TITLE: &str = "Current Message";

/// Builds tiered prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    settings: PromptSettings,
}

impl PromptAssembler {
    pub fn new(settings: PromptSettings) -> Self {
        Self { settings }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Assemble the prompt for a turn.
    pub fn build(&self, request: &PromptRequest<'_>) -> AssembledPrompt {
        let stable = self.stable_sections(request);
        let current = PromptSection::new(
            Tier::Current,
            CURRENT_TITLE,
            format!("User: {}", request.current_input.trim()),
        );

        let window_start = request
            .history
            .len()
            .saturating_sub(self.settings.history_window);
        let mut lines: Vec<String> = request.history[window_start..]
            .iter()
            .map(ChatMessage::render_line)
            .collect();

        let mut dropped = 0;
        loop {
            let mut prompt = self.compose(&stable, &lines, &current);
            let fits = self
                .settings
                .token_budget
                .map_or(true, |budget| prompt.estimated_tokens <= budget);

            if fits || lines.is_empty() {
                if !fits {
                    warn!(
                        tokens = prompt.estimated_tokens,
                        budget = ?self.settings.token_budget,
                        "prompt exceeds token budget without any history"
                    );
                }
                prompt.dropped_history = dropped;
                debug!(
                    sections = prompt.sections.len(),
                    tokens = prompt.estimated_tokens,
                    dropped,
                    "assembled prompt"
                );
                return prompt;
            }

            lines.remove(0);
            dropped += 1;
        }
    }

    fn stable_sections(&self, request: &PromptRequest<'_>) -> Vec<PromptSection> {
        let mut sections = Vec::new();

        let identity = request.character_prompt.trim();
        if !identity.is_empty() {
            sections.push(PromptSection::new(Tier::Stable, IDENTITY_TITLE, identity));
        }

        let instructions = self.settings.output_instructions.trim();
        if !instructions.is_empty() {
            sections.push(PromptSection::new(Tier::Stable, FORMAT_TITLE, instructions));
        }

        if !request.knowledge.is_empty() {
            let bullets: Vec<String> = request
                .knowledge
                .iter()
                .map(|item| {
                    let content = item.content.trim();
                    if item.title.trim().is_empty() {
                        format!("- {}", content)
                    } else {
                        format!("- {}: {}", item.title.trim(), content)
                    }
                })
                .collect();
            sections.push(PromptSection::new(
                Tier::Stable,
                KNOWLEDGE_TITLE,
                bullets.join("\n"),
            ));
        }

        if let Some(memory) = request.memory {
            let rendered = render_memory(request.injection_template, memory);
            let rendered = rendered.trim();
            if !rendered.is_empty() {
                sections.push(PromptSection::new(Tier::Stable, MEMORY_TITLE, rendered));
            }
        }

        sections
    }

    fn compose(
        &self,
        stable: &[PromptSection],
        history_lines: &[String],
        current: &PromptSection,
    ) -> AssembledPrompt {
        let history_body = if history_lines.is_empty() {
            self.settings.empty_history_text.clone()
        } else {
            history_lines.join("\n")
        };

        let mut sections = stable.to_vec();
        sections.push(PromptSection::new(Tier::History, HISTORY_TITLE, history_body));
        sections.push(current.clone());
        sections.sort_by_key(|s| s.tier);

        let mut prompt = AssembledPrompt {
            sections,
            estimated_tokens: 0,
            dropped_history: 0,
        };
        prompt.estimated_tokens = estimate_tokens(&prompt.to_prompt_string());
        prompt
    }
}
