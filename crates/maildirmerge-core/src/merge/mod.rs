//! Merge Engine
//!
//! Moves the messages of a source folder tree into a destination tree,
//! following the seen-mail policy of the run.

mod engine;
mod summary;

pub use engine::Merger;
pub use summary::MergeSummary;
