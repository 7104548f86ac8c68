//! # Character Sim
//!
//! The rules crate for character simulation. It owns the configuration grammar that character
//! authors write, and the core memory state that the grammar drives. It does not retrieve
//! knowledge or build prompts.
//!
//! ## Core Components
//!
//! - **identity**: identifiers for characters, users and sessions
//! - **simulation**: the `SimulationConfig` model with its text parser and writer
//! - **core_memory**: status values, milestones, the event log and persistent facts

pub mod core_memory;
pub mod identity;
pub mod simulation;

pub use core_memory::*;
pub use identity::*;
pub use simulation::*;
