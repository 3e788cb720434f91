//! # Partition Routing
//!
//! Turns one scalar into a partition id for one partitioning level.
//!
//! - `hash`: the murmur and legacy hash generations, `ClusterVersion` and the
//!   `(version, function type) -> algorithm` selection table
//! - `desc`: `PartDescKey`, the per-level descriptor and its `route` /
//!   `route_by_logical_index` operations
//!
//! Descriptors are immutable after `build()` and are shared across threads
//! behind `Arc`; routing takes `&self` and keeps no state.

pub mod desc;
pub mod hash;

pub use desc::{combine_part_ids, PartDescKey, PartDescKeyBuilder, PartFuncType, PartRoute};
pub use hash::{
    legacy_hash, murmurhash64a, reduce_hash, select_hash_algorithm, ClusterVersion, HashAlgorithm,
};
