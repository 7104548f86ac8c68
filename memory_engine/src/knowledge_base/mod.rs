//! Knowledge Base module - per-character knowledge with weighted relevance search.
//!
//! The knowledge base consists of:
//! - **Items**: titled pieces of knowledge with keywords, a category and a priority
//! - **Index**: the per-character collection answering relevance queries
//! - **Library**: all indexes, keyed by character

mod index;
mod item;
mod library;
mod text;

pub use index::*;
pub use item::*;
pub use library::*;
pub use text::*;
