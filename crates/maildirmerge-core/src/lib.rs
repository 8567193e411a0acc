//! maildirmerge core - server types and the merge engine
//!
//! This crate detects which mail server manages a maildir folder, exposes
//! that server's bookkeeping (POP3 state, UIDLs, IMAP subscriptions) through
//! a capability-gated interface, and merges source folder trees into a
//! destination tree.

pub mod merge;
pub mod servertypes;

pub use merge::{MergeSummary, Merger};
pub use servertypes::{builtin_registry, TypeCapability, TypeInstance, TypeRegistry};
