//! # Memory and Accounting
//!
//! Per-request parse memory is a `bumpalo::Bump` owned by the caller plus the
//! handle-addressed node store in `sql::arena`. This module holds the
//! accounting side: the injected [`ParseMetrics`] sink and its atomic
//! implementation.

pub mod metrics;

pub use metrics::{NodeKind, NoopMetrics, ParseCounters, ParseMetrics, ParseStats};
