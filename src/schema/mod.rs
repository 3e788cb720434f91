//! # Routing Schema
//!
//! Read-only partition metadata supplied by the external schema layer.
//!
//! ```text
//! RouteCatalog
//! └── (schema, table) -> Arc<TableRouteMeta>
//!     ├── part_keys: [PartitionKeyColumn]   name, schema index, level, positions
//!     ├── first: PartDescKey                level One
//!     ├── sub:   Option<PartDescKey>        level Two
//!     └── shards: partition id -> ShardLocation
//! ```

pub mod catalog;
pub mod table;

pub use catalog::RouteCatalog;
pub use table::{PartitionKeyColumn, ShardLocation, TableRouteMeta, TableRouteMetaBuilder};
