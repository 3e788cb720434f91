//! # Shard Decision Engine
//!
//! Turns the relations of one parsed statement into a set of target
//! partitions, or into a scan-all when the relations do not pin the table's
//! partition key.
//!
//! ## Rules
//!
//! Statement-wide checks come first; any of them forces a scan-all:
//!
//! | Condition                                      | Reason                    |
//! |------------------------------------------------|---------------------------|
//! | parse aborted on the node budget               | `ParseAborted`            |
//! | relations dropped at `max_relations`           | `RelationsTruncated`      |
//! | syntax error and `route_on_partial_parse` off  | `PartialParse`            |
//! | `OR` / `XOR` / `||` in a condition             | `Disjunction`             |
//! | no routable relation                           | `NoPartitionKeyPredicate` |
//!
//! Then each partitioning level is resolved on its own. A level must have a
//! single key column (`CompositeKey` otherwise). Equality relations on that
//! key are grouped by predicate id: one group is one IN list, one VALUES
//! column or one plain `=`. Each group yields a candidate set; groups are
//! conjuncts, so the level's candidates are the intersection.
//!
//! ```text
//! id IN (1, 42) AND id = 42
//!   group 0: {route(1), route(42)}
//!   group 1: {route(42)}
//!   level  : {route(42)}
//! ```
//!
//! A group with a value that cannot be routed (unbound placeholder, column,
//! expression, failed cast) is dropped whole: routing only some of an IN
//! list's values would miss rows.
//!
//! Without usable equality groups, a `>=` bound and a `<=` bound on the key
//! narrow the level when both land in the same partition and
//! `narrow_hash_ranges` is set.
//!
//! Two-level tables combine every first-level candidate with every
//! second-level candidate through `combine_part_ids`.

use std::collections::BTreeSet;
use std::fmt;

use eyre::Result;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::context::RouteContext;
use crate::config::RouterConfig;
use crate::error::{ErrorKind, RouteError};
use crate::memory::ParseMetrics;
use crate::partition::{combine_part_ids, PartDescKey, PartRoute};
use crate::schema::TableRouteMeta;
use crate::sql::{CompareOp, ExprParseResult, RelationExpr, TokenKind};
use crate::types::{Literal, ValueCaster};

/// One partition a statement must be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteTarget {
    pub partition_id: u64,
    pub tablet_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Every level pinned by equality predicates.
    Pinned,
    /// At least one level pinned by a `>=` / `<=` pair.
    PinnedByRange,
    NoPartitionKeyPredicate,
    KeyNotPinned,
    Disjunction,
    ParseAborted,
    RelationsTruncated,
    PartialParse,
    CompositeKey,
    RangeSpansPartitions,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DecisionReason::Pinned => "pinned by equality",
            DecisionReason::PinnedByRange => "pinned by range bounds",
            DecisionReason::NoPartitionKeyPredicate => "no partition-key predicate",
            DecisionReason::KeyNotPinned => "partition key not pinned",
            DecisionReason::Disjunction => "disjunction in condition",
            DecisionReason::ParseAborted => "parse aborted",
            DecisionReason::RelationsTruncated => "relation cap reached",
            DecisionReason::PartialParse => "syntax error in fragment",
            DecisionReason::CompositeKey => "multi-column partition key",
            DecisionReason::RangeSpansPartitions => "range spans partitions",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub scan_all: bool,
    /// Empty when `scan_all` is set.
    pub targets: BTreeSet<RouteTarget>,
    pub reason: DecisionReason,
}

impl RouteDecision {
    pub fn scan_all(reason: DecisionReason) -> Self {
        Self {
            scan_all: true,
            targets: BTreeSet::new(),
            reason,
        }
    }

    pub fn is_single_shard(&self) -> bool {
        !self.scan_all && self.targets.len() == 1
    }
}

/// Candidates of one partitioning level.
enum LevelRoutes {
    Pinned { routes: BTreeSet<PartRoute>, by_range: bool },
    Unpinned(DecisionReason),
}

enum Pinning {
    Pinned { targets: BTreeSet<RouteTarget>, by_range: bool },
    Unpinned(DecisionReason),
}

struct PredicateGroup {
    predicate: u32,
    routes: SmallVec<[PartRoute; 4]>,
    degraded: bool,
}

pub struct ShardDecisionEngine<'e> {
    config: &'e RouterConfig,
    caster: &'e dyn ValueCaster,
    metrics: &'e dyn ParseMetrics,
}

impl<'e> ShardDecisionEngine<'e> {
    pub fn new(config: &'e RouterConfig, caster: &'e dyn ValueCaster, metrics: &'e dyn ParseMetrics) -> Self {
        Self {
            config,
            caster,
            metrics,
        }
    }

    pub fn decide(
        &self,
        parsed: &ExprParseResult<'_>,
        meta: &TableRouteMeta,
        ctx: &RouteContext<'_>,
    ) -> Result<RouteDecision> {
        if let Some(reason) = self.statement_blocker(parsed) {
            debug!(
                table = meta.table_name(),
                reason = %reason,
                relations = parsed.all_relations.len(),
                "routing to all shards"
            );
            return Ok(RouteDecision::scan_all(reason));
        }

        let (targets, by_range) = match self.pin(parsed, meta, ctx, None)? {
            Pinning::Pinned { targets, by_range } => (targets, by_range),
            Pinning::Unpinned(reason) => return Ok(RouteDecision::scan_all(reason)),
        };

        let reason = if by_range {
            DecisionReason::PinnedByRange
        } else {
            DecisionReason::Pinned
        };
        debug!(
            table = meta.table_name(),
            targets = targets.len(),
            reason = %reason,
            "partition key pinned"
        );
        Ok(RouteDecision {
            scan_all: false,
            targets,
            reason,
        })
    }

    /// One target per `VALUES` tuple, in tuple order.
    ///
    /// `None` when the statement has no tuples, did not parse cleanly, or
    /// some tuple does not pin exactly one partition on its own.
    pub fn row_targets(
        &self,
        parsed: &ExprParseResult<'_>,
        meta: &TableRouteMeta,
        ctx: &RouteContext<'_>,
    ) -> Result<Option<Vec<RouteTarget>>> {
        if parsed.value_rows.is_empty()
            || !parsed.syntax_issues.is_empty()
            || self.statement_blocker(parsed).is_some()
        {
            return Ok(None);
        }
        let mut targets = Vec::with_capacity(parsed.value_rows.len());
        for row in 0..parsed.value_rows.len() as u32 {
            match self.pin(parsed, meta, ctx, Some(row))? {
                Pinning::Pinned { targets: pinned, .. } if pinned.len() == 1 => {
                    targets.extend(pinned);
                }
                _ => {
                    debug!(table = meta.table_name(), row, "tuple does not pin one partition");
                    return Ok(None);
                }
            }
        }
        Ok(Some(targets))
    }

    /// Resolves every level, over all relations or only those of one tuple.
    fn pin(
        &self,
        parsed: &ExprParseResult<'_>,
        meta: &TableRouteMeta,
        ctx: &RouteContext<'_>,
        row: Option<u32>,
    ) -> Result<Pinning> {
        let first = match self.level_routes(parsed, meta, meta.first_level(), true, ctx, row)? {
            LevelRoutes::Pinned { routes, by_range } => (routes, by_range),
            LevelRoutes::Unpinned(reason) => return Ok(Pinning::Unpinned(reason)),
        };
        let second = match meta.sub_level() {
            None => None,
            Some(sub) => match self.level_routes(parsed, meta, sub, false, ctx, row)? {
                LevelRoutes::Pinned { routes, by_range } => Some((routes, by_range)),
                LevelRoutes::Unpinned(reason) => return Ok(Pinning::Unpinned(reason)),
            },
        };

        let mut targets = BTreeSet::new();
        let mut by_range = first.1;
        match &second {
            None => {
                for route in &first.0 {
                    targets.insert(RouteTarget {
                        partition_id: route.partition_id,
                        tablet_id: route.tablet_id,
                    });
                }
            }
            Some((subs, sub_by_range)) => {
                by_range |= *sub_by_range;
                for route in &first.0 {
                    for sub in subs {
                        targets.insert(RouteTarget {
                            partition_id: combine_part_ids(route, sub)?,
                            tablet_id: sub.tablet_id,
                        });
                    }
                }
            }
        }
        Ok(Pinning::Pinned { targets, by_range })
    }

    fn statement_blocker(&self, parsed: &ExprParseResult<'_>) -> Option<DecisionReason> {
        if parsed.is_aborted() {
            Some(DecisionReason::ParseAborted)
        } else if parsed.truncated {
            Some(DecisionReason::RelationsTruncated)
        } else if !parsed.syntax_issues.is_empty() && !self.config.route_on_partial_parse {
            Some(DecisionReason::PartialParse)
        } else if parsed.has_disjunction {
            Some(DecisionReason::Disjunction)
        } else if parsed.relations.is_empty() {
            Some(DecisionReason::NoPartitionKeyPredicate)
        } else {
            None
        }
    }

    fn level_routes(
        &self,
        parsed: &ExprParseResult<'_>,
        meta: &TableRouteMeta,
        desc: &PartDescKey,
        first: bool,
        ctx: &RouteContext<'_>,
        row: Option<u32>,
    ) -> Result<LevelRoutes> {
        let keys: SmallVec<[usize; 4]> = meta.keys_at_level(first).map(|(idx, _)| idx).collect();
        let key = match keys.as_slice() {
            [key] => *key,
            [] => return Ok(LevelRoutes::Unpinned(DecisionReason::KeyNotPinned)),
            _ => return Ok(LevelRoutes::Unpinned(DecisionReason::CompositeKey)),
        };

        let on_key = || {
            parsed.routable().filter(move |rel| {
                rel.column_idx == Some(key) && row.map_or(true, |row| rel.ordinal == row)
            })
        };

        let mut groups: Vec<PredicateGroup> = Vec::new();
        for rel in on_key().filter(|rel| rel.op.is_equality()) {
            let slot = match groups.iter().position(|g| g.predicate == rel.predicate) {
                Some(slot) => slot,
                None => {
                    groups.push(PredicateGroup {
                        predicate: rel.predicate,
                        routes: SmallVec::new(),
                        degraded: false,
                    });
                    groups.len() - 1
                }
            };
            if groups[slot].degraded {
                continue;
            }
            match self.route_value(parsed, rel, desc, ctx)? {
                Some(route) => groups[slot].routes.push(route),
                None => groups[slot].degraded = true,
            }
        }

        let mut usable = groups.iter().filter(|g| !g.degraded && !g.routes.is_empty());
        if let Some(head) = usable.next() {
            let first_set: BTreeSet<PartRoute> = head.routes.iter().copied().collect();
            let mut routes = first_set.clone();
            for group in usable {
                routes.retain(|route| group.routes.contains(route));
            }
            if routes.is_empty() {
                debug!(key, "conjunct predicates share no partition; keeping the first");
                routes = first_set;
            }
            return Ok(LevelRoutes::Pinned {
                routes,
                by_range: false,
            });
        }

        let lower = on_key().find(|rel| rel.op == CompareOp::Ge);
        let upper = on_key().find(|rel| rel.op == CompareOp::Le);
        let (Some(lower), Some(upper)) = (lower, upper) else {
            return Ok(LevelRoutes::Unpinned(DecisionReason::KeyNotPinned));
        };
        if !self.config.narrow_hash_ranges {
            return Ok(LevelRoutes::Unpinned(DecisionReason::RangeSpansPartitions));
        }
        let low = self.route_value(parsed, lower, desc, ctx)?;
        let high = self.route_value(parsed, upper, desc, ctx)?;
        match (low, high) {
            (Some(low), Some(high)) if low.logical_index == high.logical_index => {
                Ok(LevelRoutes::Pinned {
                    routes: BTreeSet::from([low]),
                    by_range: true,
                })
            }
            (Some(_), Some(_)) => Ok(LevelRoutes::Unpinned(DecisionReason::RangeSpansPartitions)),
            _ => Ok(LevelRoutes::Unpinned(DecisionReason::KeyNotPinned)),
        }
    }

    /// Routes the value side of `rel`; `None` when it is not a routable value.
    fn route_value(
        &self,
        parsed: &ExprParseResult<'_>,
        rel: &RelationExpr,
        desc: &PartDescKey,
        ctx: &RouteContext<'_>,
    ) -> Result<Option<PartRoute>> {
        let literal = match parsed.value_of(rel) {
            Some(TokenKind::Placeholder(placeholder)) => {
                placeholder.param_index().and_then(|idx| ctx.param(idx)).copied()
            }
            Some(kind) => Literal::from_token(kind),
            None => None,
        };
        let Some(literal) = literal else {
            debug!(predicate = rel.predicate, "value side is not a literal or bound parameter");
            return Ok(None);
        };

        match desc.route(&[literal], ctx, self.caster) {
            Ok(route) => Ok(Some(route)),
            Err(err) => match RouteError::kind_of(&err) {
                Some(ErrorKind::Cast | ErrorKind::Accuracy | ErrorKind::NotSupported) => {
                    self.metrics.on_degraded_value();
                    warn!(value = %literal, error = %err, "value not routable; predicate ignored");
                    Ok(None)
                }
                _ => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    use crate::memory::{NoopMetrics, ParseCounters};
    use crate::partition::{ClusterVersion, PartFuncType};
    use crate::schema::ShardLocation;
    use crate::sql::{ExprParser, PartKeyMatcher, PartLevel, StatementHead};
    use crate::types::{ColumnType, DefaultCaster};

    fn key_table() -> TableRouteMeta {
        let first = PartDescKey::builder(4, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap();
        TableRouteMeta::builder("shop", "orders", first)
            .part_key("id", 0, PartLevel::One)
            .shards((0..4).map(|p| (p, ShardLocation::new(format!("shop_{}", p), "orders"))))
            .build()
            .unwrap()
    }

    fn two_level_table() -> TableRouteMeta {
        let first = PartDescKey::builder(4, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap();
        let sub = PartDescKey::builder(2, PartFuncType::Hash, ColumnType::bigint())
            .level(PartLevel::Two)
            .build()
            .unwrap();
        TableRouteMeta::builder("shop", "orders", first)
            .part_key("id", 0, PartLevel::One)
            .part_key("v", 1, PartLevel::Two)
            .sub_partition(sub)
            .shard(0, ShardLocation::new("shop_0", "orders"))
            .build()
            .unwrap()
    }

    fn decide_with(
        sql: &str,
        meta: &TableRouteMeta,
        config: &RouterConfig,
        ctx: &RouteContext<'_>,
    ) -> RouteDecision {
        let bump = Bump::new();
        let metrics = NoopMetrics;
        let head = StatementHead::scan(sql, config.quote_mode).unwrap();
        let matcher = PartKeyMatcher::new(meta, head.alias.map(|a| a.text), config.name_case);
        let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, &metrics, config)
            .parse()
            .unwrap();
        ShardDecisionEngine::new(config, &DefaultCaster, &metrics)
            .decide(&parsed, meta, ctx)
            .unwrap()
    }

    fn decide(sql: &str, meta: &TableRouteMeta) -> RouteDecision {
        decide_with(sql, meta, &RouterConfig::default(), &RouteContext::new(ClusterVersion::V4))
    }

    fn partitions(decision: &RouteDecision) -> Vec<u64> {
        decision.targets.iter().map(|t| t.partition_id).collect()
    }

    #[test]
    fn test_equality_pins_one_partition() {
        let meta = key_table();
        let decision = decide("SELECT * FROM orders WHERE id = 1001", &meta);
        assert!(!decision.scan_all);
        assert!(decision.is_single_shard());
        assert_eq!(partitions(&decision), vec![3]);
        assert_eq!(decision.reason, DecisionReason::Pinned);
    }

    #[test]
    fn test_in_list_routes_every_value() {
        let meta = key_table();
        let decision = decide("SELECT * FROM orders WHERE id IN (1, 42, 1001)", &meta);
        assert!(!decision.scan_all);
        assert_eq!(partitions(&decision), vec![0, 2, 3]);
    }

    #[test]
    fn test_conjuncts_intersect() {
        let meta = key_table();
        let decision = decide("SELECT * FROM orders WHERE id IN (1, 42) AND id = 42", &meta);
        assert_eq!(partitions(&decision), vec![0]);

        let decision = decide("SELECT * FROM orders WHERE id = 1 AND id = 42", &meta);
        assert_eq!(partitions(&decision), vec![2]);
    }

    #[test]
    fn test_statement_blockers() {
        let meta = key_table();
        let cases = [
            ("SELECT * FROM orders WHERE id != 5", DecisionReason::NoPartitionKeyPredicate),
            ("SELECT * FROM orders", DecisionReason::NoPartitionKeyPredicate),
            ("SELECT * FROM orders WHERE id = 1 OR id = 2", DecisionReason::Disjunction),
            ("SELECT * FROM orders WHERE v = 1", DecisionReason::NoPartitionKeyPredicate),
            ("SELECT * FROM orders WHERE id > 3", DecisionReason::KeyNotPinned),
        ];
        for (sql, reason) in cases {
            let decision = decide(sql, &meta);
            assert!(decision.scan_all, "{}", sql);
            assert!(decision.targets.is_empty());
            assert_eq!(decision.reason, reason, "{}", sql);
        }
    }

    #[test]
    fn test_bound_and_unbound_placeholders() {
        let meta = key_table();
        let params = [Literal::Int(1001)];
        let ctx = RouteContext::new(ClusterVersion::V4).with_params(&params);
        let decision = decide_with(
            "SELECT * FROM orders WHERE id = ?",
            &meta,
            &RouterConfig::default(),
            &ctx,
        );
        assert_eq!(partitions(&decision), vec![3]);

        let decision = decide("SELECT * FROM orders WHERE id = ?", &meta);
        assert!(decision.scan_all);
        assert_eq!(decision.reason, DecisionReason::KeyNotPinned);
    }

    #[test]
    fn test_cast_failure_degrades_only_its_group() {
        let meta = key_table();
        let decision = decide("SELECT * FROM orders WHERE id = 'abc'", &meta);
        assert!(decision.scan_all);

        let decision = decide("SELECT * FROM orders WHERE id IN (1, 'abc') AND id = 1001", &meta);
        assert_eq!(partitions(&decision), vec![3]);
    }

    #[test]
    fn test_degraded_value_is_counted() {
        let meta = key_table();
        let sql = "SELECT * FROM orders WHERE id = 'abc'";
        let config = RouterConfig::default();
        let bump = Bump::new();
        let counters = ParseCounters::new();
        let head = StatementHead::scan(sql, config.quote_mode).unwrap();
        let matcher = PartKeyMatcher::new(&meta, None, config.name_case);
        let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, &counters, &config)
            .parse()
            .unwrap();
        ShardDecisionEngine::new(&config, &DefaultCaster, &counters)
            .decide(&parsed, &meta, &RouteContext::new(ClusterVersion::V4))
            .unwrap();
        assert_eq!(counters.snapshot().degraded_values, 1);
    }

    #[test]
    fn test_range_in_one_partition_narrows() {
        let meta = key_table();
        let decision = decide("SELECT * FROM orders WHERE id BETWEEN 1 AND 3", &meta);
        assert_eq!(partitions(&decision), vec![2]);
        assert_eq!(decision.reason, DecisionReason::PinnedByRange);

        let decision = decide("SELECT * FROM orders WHERE id BETWEEN 1 AND 1001", &meta);
        assert!(decision.scan_all);
        assert_eq!(decision.reason, DecisionReason::RangeSpansPartitions);

        let config = RouterConfig::builder().narrow_hash_ranges(false).build().unwrap();
        let decision = decide_with(
            "SELECT * FROM orders WHERE id BETWEEN 1 AND 3",
            &meta,
            &config,
            &RouteContext::new(ClusterVersion::V4),
        );
        assert!(decision.scan_all);
    }

    #[test]
    fn test_legacy_cluster_uses_legacy_hash() {
        let meta = key_table();
        let decision = decide_with(
            "SELECT * FROM orders WHERE id = 1001",
            &meta,
            &RouterConfig::default(),
            &RouteContext::new(ClusterVersion::V3),
        );
        assert_eq!(partitions(&decision), vec![3]);
        let decision = decide_with(
            "SELECT * FROM orders WHERE id = 1",
            &meta,
            &RouterConfig::default(),
            &RouteContext::new(ClusterVersion::V3),
        );
        assert_eq!(partitions(&decision), vec![0]);
    }

    #[test]
    fn test_two_levels_combine() {
        let meta = two_level_table();
        let decision = decide("SELECT * FROM orders WHERE id = 1001 AND v = 3", &meta);
        assert_eq!(partitions(&decision), vec![(3 << 28) | 1]);

        let decision = decide("SELECT * FROM orders WHERE id IN (1, 1001) AND v IN (2, 3)", &meta);
        assert_eq!(
            partitions(&decision),
            vec![2 << 28, (2 << 28) | 1, 3 << 28, (3 << 28) | 1]
        );

        let decision = decide("SELECT * FROM orders WHERE id = 1001", &meta);
        assert!(decision.scan_all);
        assert_eq!(decision.reason, DecisionReason::KeyNotPinned);
    }

    #[test]
    fn test_composite_key_scans_all() {
        let first = PartDescKey::builder(4, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap();
        let meta = TableRouteMeta::builder("shop", "orders", first)
            .part_key("a", 0, PartLevel::One)
            .part_key("b", 1, PartLevel::One)
            .shard(0, ShardLocation::new("shop_0", "orders"))
            .build()
            .unwrap();
        let decision = decide("SELECT * FROM orders WHERE a = 1 AND b = 2", &meta);
        assert!(decision.scan_all);
        assert_eq!(decision.reason, DecisionReason::CompositeKey);
    }

    #[test]
    fn test_partial_parse_toggle() {
        let meta = key_table();
        let sql = "SELECT * FROM orders WHERE id = 1001 AND (v = 2";
        let decision = decide(sql, &meta);
        assert_eq!(partitions(&decision), vec![3]);

        let config = RouterConfig::builder().route_on_partial_parse(false).build().unwrap();
        let decision = decide_with(sql, &meta, &config, &RouteContext::new(ClusterVersion::V4));
        assert!(decision.scan_all);
        assert_eq!(decision.reason, DecisionReason::PartialParse);
    }

    #[test]
    fn test_aborted_and_truncated_parses_scan_all() {
        let meta = key_table();
        let tight = RouterConfig::builder().max_parse_nodes(16).build().unwrap();
        let decision = decide_with(
            "SELECT * FROM orders WHERE id IN (1, 2, 3, 4, 5, 6, 7, 8)",
            &meta,
            &tight,
            &RouteContext::new(ClusterVersion::V4),
        );
        assert_eq!(decision.reason, DecisionReason::ParseAborted);

        let capped = RouterConfig::builder().max_relations(2).build().unwrap();
        let decision = decide_with(
            "SELECT * FROM orders WHERE id IN (1, 2, 3)",
            &meta,
            &capped,
            &RouteContext::new(ClusterVersion::V4),
        );
        assert_eq!(decision.reason, DecisionReason::RelationsTruncated);
    }

    #[test]
    fn test_multi_row_insert_spans_partitions() {
        let meta = key_table();
        let decision = decide("INSERT INTO orders (id, v) VALUES (1, 'a'), (42, 'b')", &meta);
        assert_eq!(partitions(&decision), vec![0, 2]);
    }

    fn rows_with(sql: &str, meta: &TableRouteMeta, ctx: &RouteContext<'_>) -> Option<Vec<u64>> {
        let bump = Bump::new();
        let config = RouterConfig::default();
        let head = StatementHead::scan(sql, config.quote_mode).unwrap();
        let matcher = PartKeyMatcher::new(meta, head.alias.map(|a| a.text), config.name_case);
        let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, &NoopMetrics, &config)
            .parse()
            .unwrap();
        ShardDecisionEngine::new(&config, &DefaultCaster, &NoopMetrics)
            .row_targets(&parsed, meta, ctx)
            .unwrap()
            .map(|targets| targets.iter().map(|t| t.partition_id).collect())
    }

    #[test]
    fn test_row_targets_follow_tuple_order() {
        let meta = key_table();
        let ctx = RouteContext::new(ClusterVersion::V4);
        assert_eq!(
            rows_with("INSERT INTO orders (id, v) VALUES (42, 'b'), (1, 'a'), (2, 'c')", &meta, &ctx),
            Some(vec![0, 2, 2])
        );
        assert_eq!(
            rows_with("REPLACE INTO orders (v, id) VALUES ('a', 1001)", &meta, &ctx),
            Some(vec![3])
        );
    }

    #[test]
    fn test_row_targets_need_every_tuple_pinned() {
        let meta = key_table();
        let ctx = RouteContext::new(ClusterVersion::V4);
        assert_eq!(rows_with("INSERT INTO orders (v) VALUES ('a'), ('b')", &meta, &ctx), None);
        assert_eq!(
            rows_with("INSERT INTO orders (id, v) VALUES (1, 'a'), (?, 'b')", &meta, &ctx),
            None
        );
        assert_eq!(rows_with("INSERT INTO orders SET id = 1, v = 'a'", &meta, &ctx), None);
        assert_eq!(rows_with("SELECT * FROM orders WHERE id IN (1, 42)", &meta, &ctx), None);
        assert_eq!(rows_with("INSERT INTO orders (id) VALUES (1), (42", &meta, &ctx), None);

        let params = [Literal::Int(42)];
        let bound = RouteContext::new(ClusterVersion::V4).with_params(&params);
        assert_eq!(
            rows_with("INSERT INTO orders (id, v) VALUES (1, 'a'), (?, 'b')", &meta, &bound),
            Some(vec![2, 0])
        );
    }

    #[test]
    fn test_two_level_rows_combine_per_tuple() {
        let meta = two_level_table();
        let ctx = RouteContext::new(ClusterVersion::V4);
        let sql = "INSERT INTO orders (id, v) VALUES (1001, 3), (1, 2)";
        assert_eq!(rows_with(sql, &meta, &ctx), Some(vec![(3 << 28) | 1, 2 << 28]));
        assert_eq!(
            partitions(&decide(sql, &meta)),
            vec![2 << 28, (2 << 28) | 1, 3 << 28, (3 << 28) | 1]
        );
    }
}
