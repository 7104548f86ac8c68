//! # Memory Engine
//!
//! The contextual knowledge and selective memory engine behind a voice-character chat. It
//! works on top of `character_sim` and does no I/O. Callers load and persist state through
//! the [`KeyValueStore`] seam and send the assembled prompt to a language model themselves.
//!
//! ## Core Components
//!
//! - **knowledge_base**: per-character knowledge items with weighted relevance search
//! - **session_cache**: incremental per-session knowledge cache (hit / partial / miss)
//! - **memory**: core memory storage and the per-turn update engine
//! - **prompt_assembler**: three-tier, token-budgeted prompt construction
//! - **engine**: the per-turn pipeline wiring everything together
//!
//! ## Turn Flow
//!
//! 1. The user message resolves against the session cache (knowledge retrieval)
//! 2. The prompt is assembled from identity, knowledge, memory and history
//! 3. The caller runs the language model
//! 4. The finished turn is fed back so triggers and milestones update the core memory

pub mod conversation;
pub mod engine;
pub mod error;
pub mod knowledge_base;
pub mod memory;
pub mod prompt_assembler;
pub mod session_cache;
pub mod settings;
pub mod store;

pub use conversation::*;
pub use engine::*;
pub use error::EngineError;
pub use knowledge_base::*;
pub use memory::*;
pub use prompt_assembler::*;
pub use session_cache::*;
pub use settings::*;
pub use store::*;
