//! # Parse Metrics
//!
//! The fragment parser reports allocation and error events to a sink passed
//! in by the caller instead of bumping process-wide counters. A router owns
//! one sink and hands a reference to every per-request arena, so counting is
//! shared while parse state stays request-local.
//!
//! ## Events
//!
//! | Event                | When                                                  |
//! |----------------------|-------------------------------------------------------|
//! | `on_node_alloc`      | arena handed out a token, token-list or relation node |
//! | `on_alloc_failure`   | arena node budget exhausted; the parse aborts         |
//! | `on_syntax_error`    | a syntax error was swallowed and a partial result kept|
//! | `on_relation_dropped`| the per-statement relation cap discarded a relation   |
//! | `on_degraded_value`  | cast or accuracy failure made a predicate unroutable  |
//! | `on_scan_all`        | a statement routed to every shard                     |
//!
//! [`ParseCounters`] implements the sink with relaxed atomics; readers take a
//! [`ParseStats`] snapshot, which is internally consistent per counter but not
//! across counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Token,
    TokenList,
    Relation,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Token => "token",
            NodeKind::TokenList => "token_list",
            NodeKind::Relation => "relation",
        }
    }
}

pub trait ParseMetrics: Send + Sync + fmt::Debug {
    fn on_node_alloc(&self, _kind: NodeKind) {}
    fn on_alloc_failure(&self) {}
    fn on_syntax_error(&self) {}
    fn on_relation_dropped(&self) {}
    fn on_degraded_value(&self) {}
    fn on_scan_all(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ParseMetrics for NoopMetrics {}

#[derive(Debug, Default)]
pub struct ParseCounters {
    tokens: AtomicU64,
    token_lists: AtomicU64,
    relations: AtomicU64,
    alloc_failures: AtomicU64,
    syntax_errors: AtomicU64,
    relations_dropped: AtomicU64,
    degraded_values: AtomicU64,
    scan_all: AtomicU64,
}

impl ParseCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ParseStats {
        ParseStats {
            tokens: self.tokens.load(Ordering::Relaxed),
            token_lists: self.token_lists.load(Ordering::Relaxed),
            relations: self.relations.load(Ordering::Relaxed),
            alloc_failures: self.alloc_failures.load(Ordering::Relaxed),
            syntax_errors: self.syntax_errors.load(Ordering::Relaxed),
            relations_dropped: self.relations_dropped.load(Ordering::Relaxed),
            degraded_values: self.degraded_values.load(Ordering::Relaxed),
            scan_all: self.scan_all.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.tokens,
            &self.token_lists,
            &self.relations,
            &self.alloc_failures,
            &self.syntax_errors,
            &self.relations_dropped,
            &self.degraded_values,
            &self.scan_all,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl ParseMetrics for ParseCounters {
    fn on_node_alloc(&self, kind: NodeKind) {
        let counter = match kind {
            NodeKind::Token => &self.tokens,
            NodeKind::TokenList => &self.token_lists,
            NodeKind::Relation => &self.relations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn on_alloc_failure(&self) {
        self.alloc_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_syntax_error(&self) {
        self.syntax_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_relation_dropped(&self) {
        self.relations_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn on_degraded_value(&self) {
        self.degraded_values.fetch_add(1, Ordering::Relaxed);
    }

    fn on_scan_all(&self) {
        self.scan_all.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseStats {
    pub tokens: u64,
    pub token_lists: u64,
    pub relations: u64,
    pub alloc_failures: u64,
    pub syntax_errors: u64,
    pub relations_dropped: u64,
    pub degraded_values: u64,
    pub scan_all: u64,
}

impl ParseStats {
    pub fn nodes(&self) -> u64 {
        self.tokens + self.token_lists + self.relations
    }
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes:{}(tok:{},list:{},rel:{}),alloc_fail:{},syntax:{},dropped:{},degraded:{},scan_all:{}",
            self.nodes(),
            self.tokens,
            self.token_lists,
            self.relations,
            self.alloc_failures,
            self.syntax_errors,
            self.relations_dropped,
            self.degraded_values,
            self.scan_all
        )
    }
}
