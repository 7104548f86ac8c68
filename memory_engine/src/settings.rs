//! Engine tuning, loadable from TOML.
//!
//! ```toml
//! [cache]
//! hit_threshold = 0.7
//! partial_threshold = 0.3
//!
//! [prompt]
//! history_window = 20
//! token_budget = 3000
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Settings of the session knowledge cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Overlap above which cached items are reused without searching.
    pub hit_threshold: f32,

    /// Overlap above which cached and fresh items are blended.
    pub partial_threshold: f32,

    /// Maximum items fetched per topic search.
    pub max_results_per_topic: usize,

    /// Cached items included in a partial hit.
    pub partial_cached_items: usize,

    /// Fresh items included in a partial hit.
    pub partial_fresh_items: usize,

    /// Multiplier applied to every entry's relevance each turn (0.0-1.0).
    pub relevance_decay: f32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            hit_threshold: 0.7,
            partial_threshold: 0.3,
            max_results_per_topic: 3,
            partial_cached_items: 2,
            partial_fresh_items: 2,
            relevance_decay: 0.9,
        }
    }
}

/// Settings of the prompt assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Number of recent messages rendered in the history tier.
    pub history_window: usize,

    /// Estimated token ceiling; oldest history is dropped to fit.
    pub token_budget: Option<usize>,

    /// Output-format instructions placed in the stable tier.
    pub output_instructions: String,

    /// Text rendered when there is no history yet.
    pub empty_history_text: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            history_window: 15,
            token_budget: None,
            output_instructions: "Stay in character. Reply in one or two short spoken sentences \
                                  without stage directions, lists or markdown."
                .to_string(),
            empty_history_text: "(This is the start of the conversation.)".to_string(),
        }
    }
}

/// All engine settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub cache: CacheSettings,
    pub prompt: PromptSettings,
}

impl EngineSettings {
    /// Parse settings from TOML; missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: EngineSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);

        if !in_unit(cache.hit_threshold) || !in_unit(cache.partial_threshold) {
            return Err(EngineError::InvalidSettings(
                "cache thresholds must lie within 0.0..=1.0".to_string(),
            ));
        }
        if cache.partial_threshold >= cache.hit_threshold {
            return Err(EngineError::InvalidSettings(format!(
                "partial_threshold ({}) must be below hit_threshold ({})",
                cache.partial_threshold, cache.hit_threshold
            )));
        }
        if !(cache.relevance_decay > 0.0 && cache.relevance_decay <= 1.0) {
            return Err(EngineError::InvalidSettings(format!(
                "relevance_decay ({}) must lie within (0.0, 1.0]",
                cache.relevance_decay
            )));
        }
        Ok(())
    }
}
