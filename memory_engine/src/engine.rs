//! Chat Memory Engine - the per-turn pipeline.
//!
//! ```text
//! user message ──> SessionKnowledgeCache ──> PromptAssembler ──> (caller runs the model)
//!                        │                        ▲                        │
//!                  KnowledgeLibrary          MemoryStore <── MemoryUpdateEngine
//! ```
//!
//! Unknown characters never fail a turn: they get the default (empty) config, no knowledge
//! and a default memory.

use character_sim::{
    parse, CharacterId, ConfigDiagnostic, CoreMemory, MemoryKey, ParsedConfig, SessionId,
    SimulationConfig, UserId,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::conversation::ChatMessage;
use crate::error::Result;
use crate::knowledge_base::KnowledgeItem;
use crate::memory::{MemoryStore, MemoryUpdateEngine, TurnMatcher, TurnOutcome};
use crate::prompt_assembler::{AssembledPrompt, PromptAssembler, PromptRequest};
use crate::session_cache::{CacheResolution, SessionCache, SessionKnowledgeCache};
use crate::settings::EngineSettings;
use crate::store::{InMemoryStore, KeyValueStore};

/// A registered character: identity prompt plus its configuration, parsed once.
#[derive(Debug, Clone)]
pub struct CharacterProfile {
    pub character_id: CharacterId,
    pub identity_prompt: String,
    raw_config: String,
    parsed: ParsedConfig,
}

impl CharacterProfile {
    pub fn new(
        character_id: CharacterId,
        identity_prompt: impl Into<String>,
        config_text: &str,
    ) -> Self {
        Self {
            character_id,
            identity_prompt: identity_prompt.into(),
            raw_config: config_text.to_string(),
            parsed: parse(config_text),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.parsed.config
    }

    pub fn diagnostics(&self) -> &[ConfigDiagnostic] {
        &self.parsed.diagnostics
    }

    pub fn raw_config(&self) -> &str {
        &self.raw_config
    }

    /// Replace the config text. Returns `false` (and skips parsing) when it is unchanged.
    pub fn set_config_text(&mut self, config_text: &str) -> bool {
        if self.raw_config == config_text {
            return false;
        }
        self.raw_config = config_text.to_string();
        self.parsed = parse(config_text);
        true
    }
}

/// Input of [`ChatMemoryEngine::prepare_turn`].
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub session_id: &'a SessionId,
    pub user_id: &'a UserId,
    pub character_id: &'a CharacterId,
    pub user_message: &'a str,
    /// Conversation so far, oldest first, excluding `user_message`.
    pub history: &'a [ChatMessage],
}

/// Everything the caller needs to run the model for a turn.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub prompt: AssembledPrompt,
    pub resolution: CacheResolution,
    pub memory: CoreMemory,
}

/// The engine facade.
#[derive(Debug)]
pub struct ChatMemoryEngine<
    M = InMemoryStore<MemoryKey, CoreMemory>,
    C = InMemoryStore<SessionId, SessionCache>,
> {
    profiles: HashMap<CharacterId, CharacterProfile>,
    default_config: SimulationConfig,
    memories: MemoryStore<M>,
    cache: SessionKnowledgeCache<C>,
    updater: MemoryUpdateEngine,
    assembler: PromptAssembler,
}

impl ChatMemoryEngine {
    /// Create an engine with in-memory stores. Fails if the settings do not validate.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        Self::with_stores(settings, InMemoryStore::new(), InMemoryStore::new())
    }

    pub fn with_defaults() -> Self {
        Self::build(
            EngineSettings::default(),
            InMemoryStore::new(),
            InMemoryStore::new(),
        )
    }
}

impl<M, C> ChatMemoryEngine<M, C>
where
    M: KeyValueStore<MemoryKey, CoreMemory>,
    C: KeyValueStore<SessionId, SessionCache>,
{
    pub fn with_stores(
        settings: EngineSettings,
        memory_store: M,
        cache_store: C,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings, memory_store, cache_store))
    }

    fn build(settings: EngineSettings, memory_store: M, cache_store: C) -> Self {
        Self {
            profiles: HashMap::new(),
            default_config: SimulationConfig::default(),
            memories: MemoryStore::with_store(memory_store),
            cache: SessionKnowledgeCache::with_store(
                Default::default(),
                cache_store,
                settings.cache,
            ),
            updater: MemoryUpdateEngine::new(),
            assembler: PromptAssembler::new(settings.prompt),
        }
    }

    /// Replace the keyword matcher used for triggers and milestones.
    pub fn with_matcher(mut self, matcher: impl TurnMatcher + 'static) -> Self {
        self.updater = MemoryUpdateEngine::with_matcher(matcher);
        self
    }

    /// Register (or replace) a character with its config text and knowledge.
    ///
    /// Returns the config diagnostics for the author; the character is usable either way.
    pub fn register_character(
        &mut self,
        character_id: CharacterId,
        identity_prompt: impl Into<String>,
        config_text: &str,
        items: impl IntoIterator<Item = KnowledgeItem>,
    ) -> Vec<ConfigDiagnostic> {
        let profile = CharacterProfile::new(character_id.clone(), identity_prompt, config_text);
        log_diagnostics(&character_id, profile.diagnostics());

        self.cache
            .library_mut()
            .insert_items(character_id.clone(), items);
        let diagnostics = profile.diagnostics().to_vec();
        info!(
            character = %character_id,
            statuses = profile.config().status_defs.len(),
            diagnostics = diagnostics.len(),
            "registered character"
        );
        self.profiles.insert(character_id, profile);
        diagnostics
    }

    /// Replace a character's config text; parsing only happens when the text changed.
    pub fn update_config(
        &mut self,
        character_id: &CharacterId,
        config_text: &str,
    ) -> Vec<ConfigDiagnostic> {
        let profile = self
            .profiles
            .entry(character_id.clone())
            .or_insert_with(|| CharacterProfile::new(character_id.clone(), "", ""));

        if profile.set_config_text(config_text) {
            log_diagnostics(character_id, profile.diagnostics());
            info!(character = %character_id, "character config updated");
        }
        profile.diagnostics().to_vec()
    }

    /// Replace a character's knowledge.
    pub fn set_knowledge(
        &mut self,
        character_id: CharacterId,
        items: impl IntoIterator<Item = KnowledgeItem>,
    ) {
        self.cache.library_mut().insert_items(character_id, items);
    }

    pub fn profile(&self, character_id: &CharacterId) -> Option<&CharacterProfile> {
        self.profiles.get(character_id)
    }

    /// The character's config, or the empty default for unknown characters.
    pub fn config(&self, character_id: &CharacterId) -> &SimulationConfig {
        self.profiles
            .get(character_id)
            .map_or(&self.default_config, CharacterProfile::config)
    }

    /// Start a session: load or create the memory and seed the cache from the greeting.
    pub fn open_session(
        &mut self,
        session_id: &SessionId,
        user_id: &UserId,
        character_id: &CharacterId,
        greeting: Option<&str>,
    ) -> CoreMemory {
        let config = self
            .profiles
            .get(character_id)
            .map_or(&self.default_config, CharacterProfile::config);
        let memory = self.memories.initialize(user_id, character_id, config);

        let seeded = greeting
            .map(|text| self.cache.seed(session_id, text, character_id))
            .unwrap_or(0);
        info!(
            session = %session_id,
            memory = %memory.key(),
            seeded,
            "session opened"
        );
        memory
    }

    /// Resolve knowledge and assemble the prompt for a user message.
    pub fn prepare_turn(&mut self, request: &TurnRequest<'_>) -> PreparedTurn {
        let profile = self.profiles.get(request.character_id);
        if profile.is_none() {
            debug!(character = %request.character_id, "unknown character, using defaults");
        }
        let config = profile.map_or(&self.default_config, CharacterProfile::config);
        let identity = profile.map_or("", |p| p.identity_prompt.as_str());

        let resolution =
            self.cache
                .resolve(request.session_id, request.user_message, request.character_id);

        let mut memory = self
            .memories
            .initialize(request.user_id, request.character_id, config);
        if memory.reconcile(config) {
            self.memories.save(memory.clone());
        }

        let prompt = self.assembler.build(
            &PromptRequest::new(request.user_message)
                .with_character_prompt(identity)
                .with_knowledge(&resolution.items)
                .with_memory(&memory, &config.injection_template)
                .with_history(request.history),
        );

        PreparedTurn {
            prompt,
            resolution,
            memory,
        }
    }

    /// Apply the finished exchange to the pair's memory and save it.
    pub fn complete_turn(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        user_message: &str,
        assistant_message: &str,
    ) -> TurnOutcome {
        let config = self
            .profiles
            .get(character_id)
            .map_or(&self.default_config, CharacterProfile::config);

        let mut memory = self.memories.initialize(user_id, character_id, config);
        let outcome = self
            .updater
            .apply_turn(&mut memory, config, user_message, assistant_message);
        self.memories.save(memory);
        outcome
    }

    /// The compression request for a pair, if its character defines a compression prompt.
    pub fn compression_request(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        history: &[ChatMessage],
    ) -> Option<String> {
        let memory = self.memories.get(user_id, character_id)?;
        self.updater
            .compression_request(self.config(character_id), &memory, history)
    }

    /// Store a compression summary. Returns `false` if the pair has no memory.
    pub fn record_compression(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        summary: &str,
    ) -> bool {
        let Some(mut memory) = self.memories.get(user_id, character_id) else {
            return false;
        };
        self.updater.record_compression(&mut memory, summary);
        self.memories.save(memory);
        true
    }

    /// Drop a session's knowledge cache, returning it for persistence.
    pub fn end_session(&mut self, session_id: &SessionId) -> Option<SessionCache> {
        let cache = self.cache.reset(session_id);
        info!(
            session = %session_id,
            topics = cache.as_ref().map_or(0, |c| c.entries.len()),
            "session ended"
        );
        cache
    }

    pub fn memories(&self) -> &MemoryStore<M> {
        &self.memories
    }

    pub fn memories_mut(&mut self) -> &mut MemoryStore<M> {
        &mut self.memories
    }

    pub fn cache(&self) -> &SessionKnowledgeCache<C> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SessionKnowledgeCache<C> {
        &mut self.cache
    }
}

fn log_diagnostics(character_id: &CharacterId, diagnostics: &[ConfigDiagnostic]) {
    for diagnostic in diagnostics {
        warn!(character = %character_id, "{}", diagnostic);
    }
}
