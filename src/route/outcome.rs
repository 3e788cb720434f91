//! Result of routing one statement.

use super::decision::{DecisionReason, RouteTarget};
use crate::schema::ShardLocation;

/// Rewritten statement for one physical shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardStatement {
    pub location: ShardLocation,
    /// Partitions of this shard the statement is meant for.
    pub partitions: Vec<RouteTarget>,
    pub sql: String,
    /// Indexes of the request's bound parameters, in the order `sql` uses
    /// them. Differs from `0..placeholder_count` only for a split batch.
    pub params: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub scan_all: bool,
    pub reason: DecisionReason,
    /// Pinned partitions; empty for a scan-all.
    pub targets: Vec<RouteTarget>,
    /// One entry per distinct shard, ordered by location.
    pub statements: Vec<ShardStatement>,
    pub placeholder_count: u32,
    pub batch_values_count: u32,
    pub syntax_issue_count: usize,
}

impl RouteOutcome {
    pub fn is_single_shard(&self) -> bool {
        self.statements.len() == 1
    }

    pub fn partition_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.targets.iter().map(|target| target.partition_id)
    }

    pub fn statement_for(&self, location: &ShardLocation) -> Option<&ShardStatement> {
        self.statements.iter().find(|stmt| &stmt.location == location)
    }
}
