//! Error types for the memory engine.
//!
//! Nothing on the per-turn path returns these: unknown characters, empty queries and clamped
//! values all degrade to empty or default results. Errors only come from loading settings and
//! from (de)serializing persisted state.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] character_sim::SnapshotError),
}
