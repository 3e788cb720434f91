//! # Routing
//!
//! Decision and rewrite layer on top of [`crate::sql`] and
//! [`crate::partition`]:
//!
//! - `context`: per-request inputs (cluster version, bound parameters,
//!   session database, accuracy mode)
//! - `decision`: relations to target partitions, or scan-all
//! - `rewrite`: byte-span identifier substitution per shard
//! - `outcome`: what the session layer receives
//! - `router`: `ShardRouter`, the one-call entry point
//!
//! ## Example
//!
//! ```ignore
//! let router = ShardRouter::new(RouterConfig::default(), catalog)?;
//! let ctx = RouteContext::new(ClusterVersion::V4).with_default_database("shop");
//! let outcome = router.route("SELECT * FROM orders WHERE id = 1001", &ctx)?;
//! for stmt in &outcome.statements {
//!     println!("{} <- {}", stmt.location, stmt.sql);
//! }
//! ```

pub mod context;
pub mod decision;
pub mod outcome;
pub mod rewrite;
pub mod router;

pub use context::RouteContext;
pub use decision::{DecisionReason, RouteDecision, RouteTarget, ShardDecisionEngine};
pub use outcome::{RouteOutcome, ShardStatement};
pub use rewrite::RewritePlan;
pub use router::ShardRouter;
