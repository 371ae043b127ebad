//! Cross-library synchronization primitives
//!
//! - `comparator` - Presence of records and duplicate classes in another library
//! - `sync_id` - Stable sync ids shared by the same content in two libraries

pub mod comparator;
pub mod sync_id;

pub use comparator::{contains, similar_records, Comparison, ExactComparison, SetComparator};
pub use sync_id::{build_sync_id_maps, Side, SyncIdCache, SyncIdMaps};
