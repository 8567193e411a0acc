//! maildirmerge Common - Shared configuration and errors
//!
//! This crate provides the configuration and error types
//! shared across all maildirmerge components.

pub mod config;
pub mod error;

pub use config::{Config, LoggingConfig, MergeConfig, SeenPolicy};
pub use error::{Error, Result};
