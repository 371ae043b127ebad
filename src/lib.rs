//! Media Library
//!
//! Duplicate detection inside a photo/video library and stable sync ids
//! across two libraries.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error types and the persisted metadata store
//! - [`library`] - Media records, the per-library container and directory scanning
//! - [`index`] - The three tiered indexes: storage identity, (date, size) and
//!   near-duplicate signature clusters
//! - [`duplicate`] - Signature computation, duplicate classes and reporting
//! - [`sync`] - Cross-library comparison and sync id assignment
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use media_library::core::config::Config;
//! use media_library::core::store::MetadataStore;
//! use media_library::duplicate::{duplicate_groups, DuplicateManager, SignatureComputer};
//! use media_library::library::scanner::scan_library;
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let root = Path::new("/photos");
//!     let store = MetadataStore::load_or_default(&config.library.metadata_path(root));
//!
//!     let (mut library, _stats) = scan_library("photos", root, &config.library, &store)?;
//!
//!     // Only dates with several file sizes need signatures
//!     let manager = DuplicateManager::with_computer(SignatureComputer::new(config.signature));
//!     manager.resolve(&mut library, &AtomicBool::new(false), |_| {})?;
//!
//!     for group in duplicate_groups(&library).iter().filter(|g| g.is_duplicate()) {
//!         println!("{:?}", group.members);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency
//!
//! Indexes have no internal locking. Every mutation goes through
//! `&mut Library`, so single-writer access is checked at compile time.
//! Signatures are computed on a rayon pool and merged on the calling thread.

pub mod cli;
pub mod core;
pub mod duplicate;
pub mod index;
pub mod library;
pub mod sync;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
