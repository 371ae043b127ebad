//! Duplicate detection module
//!
//! Decides which records of one library are the same content, computing
//! expensive signatures only where the cheap size tier is ambiguous.
//!
//! # Submodules
//!
//! - `signature` - Perceptual hash / size proxy computation
//! - `manager` - Duplicate classes, lazy resolution and metadata propagation
//! - `report` - Group labels and the group-size table

pub mod manager;
pub mod report;
pub mod signature;

pub use manager::{
    candidate_duplicates, duplicate_groups, propagate, propagate_camera_models, undated_groups,
    DuplicateGroup, DuplicateManager, GroupSource, PassStats, PropagatedField, SignatureProgress,
};
pub use report::{format_histogram, group_size_histogram, label_groups, GroupLabel};
pub use signature::{ComputedSignature, SignatureComputer, SignatureSource};
