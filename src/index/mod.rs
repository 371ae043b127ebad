//! Tiered lookup indexes
//!
//! Three independently addressable structures of increasing comparison cost:
//!
//! - `identity` - storage identity (free, exact)
//! - `size` - capture date + byte size (free once known)
//! - `signature` - capture date + near-duplicate fingerprint clusters (expensive)
//!
//! None of them lock internally. They are owned by a [`crate::library::Library`],
//! whose `&mut self` mutators guarantee a single writer.

pub mod identity;
pub mod signature;
pub mod size;

pub use identity::ExactIdentityIndex;
pub use signature::{Cluster, SignatureIndex};
pub use size::SizeIndex;
