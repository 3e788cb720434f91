//! # keyroute - Partition-Key Extraction and Shard Routing
//!
//! keyroute sits in a MySQL proxy between the client session and a set of
//! sharded backends. For each statement it finds the predicates on the
//! table's partition-key columns, hashes the pinned values into partitions,
//! and hands back one rewritten statement per physical shard:
//!
//! - **No full SQL parse**: only the statement head and the WHERE / VALUES
//!   fragment are scanned, with a tolerant grammar
//! - **Hash compatibility**: both the murmur and the legacy partition hash
//!   are reproduced bit for bit, selected by cluster version
//! - **Byte-exact rewrite**: physical names are substituted at recorded
//!   spans; the rest of the statement is never re-serialized
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyroute::{ClusterVersion, RouteCatalog, RouteContext, RouterConfig, ShardRouter};
//!
//! let catalog = Arc::new(RouteCatalog::default());
//! catalog.install(orders_meta);
//!
//! let router = ShardRouter::new(RouterConfig::default(), catalog)?;
//! let ctx = RouteContext::new(ClusterVersion::V4).with_default_database("shop");
//! let outcome = router.route("SELECT * FROM orders WHERE id IN (1, 42)", &ctx)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        ShardRouter (route)           │
//! ├──────────────────┬──────────────────┤
//! │ Decision Engine  │  Rewrite Plan     │
//! ├──────────────────┴──────────────────┤
//! │   Fragment Grammar + Key Matcher     │
//! ├─────────────────────────────────────┤
//! │   Lexer │ Statement Head Scan        │
//! ├─────────────────────────────────────┤
//! │ Partition Router (hash, PartDescKey) │
//! ├─────────────────────────────────────┤
//! │  Value Coercion │ Route Catalog       │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: constants and `RouterConfig`
//! - [`error`]: `RouteError` taxonomy carried in `eyre::Report`
//! - [`memory`]: injected parse metrics sink
//! - [`sql`]: lexer, statement head scan, fragment grammar
//! - [`types`]: literals, column types, coercion
//! - [`partition`]: partition descriptors and hash algorithms
//! - [`schema`]: table routing metadata and the catalog
//! - [`route`]: decision engine, rewrite, `ShardRouter`

pub mod config;
pub mod error;
pub mod memory;
pub mod partition;
pub mod route;
pub mod schema;
pub mod sql;
pub mod types;

pub use config::{NameCase, QuoteMode, RouterConfig, RouterConfigBuilder};
pub use error::{ErrorKind, RouteError};
pub use memory::{NoopMetrics, ParseCounters, ParseMetrics, ParseStats};
pub use partition::{ClusterVersion, HashAlgorithm, PartDescKey, PartFuncType, PartRoute};
pub use route::{
    DecisionReason, RouteContext, RouteDecision, RouteOutcome, RouteTarget, ShardRouter,
    ShardStatement,
};
pub use schema::{RouteCatalog, ShardLocation, TableRouteMeta};
pub use types::{Collation, ColumnType, DefaultCaster, Literal, ValueCaster};
