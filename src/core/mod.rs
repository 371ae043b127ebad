//! Core functionality module
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `store` - Persisted per-file metadata from which libraries are rebuilt

pub mod config;
pub mod error;
pub mod store;
