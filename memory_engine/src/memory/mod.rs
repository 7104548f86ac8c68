//! Memory module - core memory storage and the per-turn update engine.
//!
//! - **Store**: one [`CoreMemory`](character_sim::CoreMemory) per (user, character)
//! - **Matcher**: decides whether a keyword occurs in a turn
//! - **Update**: applies triggers and milestones after each completed turn

mod matcher;
mod store;
mod update;

pub use matcher::*;
pub use store::*;
pub use update::*;
