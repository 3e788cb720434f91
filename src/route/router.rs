//! # Shard Router
//!
//! Entry point used by the session layer: one call per statement.
//!
//! ```text
//! sql ─► StatementHead::scan ─► RouteCatalog::get ─► ExprParser::parse
//!                                                        │
//!        RouteOutcome ◄─ RewritePlan::apply ◄─ ShardDecisionEngine::decide
//! ```
//!
//! The router itself holds no per-request state. Each call allocates its own
//! `Bump` and parse arena, so one `ShardRouter` can be shared across threads
//! behind an `Arc`.
//!
//! ## Errors
//!
//! | Condition                               | Error             |
//! |-----------------------------------------|-------------------|
//! | empty statement, no database to resolve | `InvalidArgument` |
//! | statement kind not routable             | `NotSupported`    |
//! | INSERT / REPLACE that would scan all    | `NotSupported`    |
//! | multi-shard batch that cannot be split  | `NotSupported`    |
//! | table missing from the catalog          | `UnknownTable`    |
//! | integer literal out of `i64` range      | `Overflow`        |
//! | pinned partition without a shard        | `ShardNotFound`   |
//! | rewrite offsets no longer valid         | `Unexpected`      |
//!
//! Everything else, syntax errors included, degrades to a scan-all.
//!
//! ## Batch INSERT
//!
//! An INSERT or REPLACE whose tuples land on more than one shard is split:
//! each shard receives the statement with only its own tuples, and
//! `ShardStatement::params` lists which of the request's bound parameters
//! that text uses, in order. A batch where some tuple does not pin exactly
//! one partition is refused rather than copied to every shard.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bumpalo::Bump;
use eyre::{bail, ensure, Result, WrapErr};
use tracing::debug;

use super::context::RouteContext;
use super::decision::{RouteTarget, ShardDecisionEngine};
use super::outcome::{RouteOutcome, ShardStatement};
use super::rewrite::RewritePlan;
use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::memory::{NoopMetrics, ParseMetrics};
use crate::schema::{RouteCatalog, ShardLocation, TableRouteMeta};
use crate::sql::{ExprParseResult, ExprParser, PartKeyMatcher, Span, StatementHead, StatementKind};
use crate::types::{DefaultCaster, ValueCaster};

pub struct ShardRouter {
    config: RouterConfig,
    catalog: Arc<RouteCatalog>,
    metrics: Arc<dyn ParseMetrics>,
    caster: Arc<dyn ValueCaster>,
}

impl ShardRouter {
    pub fn new(config: RouterConfig, catalog: Arc<RouteCatalog>) -> Result<Self> {
        config.validate().wrap_err("invalid router configuration")?;
        Ok(Self {
            config,
            catalog,
            metrics: Arc::new(NoopMetrics),
            caster: Arc::new(DefaultCaster),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ParseMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_caster(mut self, caster: Arc<dyn ValueCaster>) -> Self {
        self.caster = caster;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<RouteCatalog> {
        &self.catalog
    }

    pub fn route(&self, sql: &str, ctx: &RouteContext<'_>) -> Result<RouteOutcome> {
        ensure!(
            !sql.trim().is_empty(),
            RouteError::invalid_argument("empty statement")
        );

        let head = StatementHead::scan(sql, self.config.quote_mode)?;
        let database = match (&head.database, ctx.default_database) {
            (Some(db), _) => db.text,
            (None, Some(db)) => db,
            (None, None) => bail!(RouteError::invalid_argument(format!(
                "table {} is not qualified and the session has no default database",
                head.table.text
            ))),
        };
        let Some(meta) = self.catalog.get(database, head.table.text) else {
            bail!(RouteError::UnknownTable {
                database: database.to_string(),
                table: head.table.text.to_string(),
            });
        };

        let bump = Bump::new();
        let metrics: &dyn ParseMetrics = self.metrics.as_ref();
        let matcher = PartKeyMatcher::new(&meta, head.alias.map(|a| a.text), self.config.name_case);
        let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, metrics, &self.config).parse()?;

        let ctx = ctx.with_need_accurate(ctx.need_accurate || self.config.strict_accuracy);
        let engine = ShardDecisionEngine::new(&self.config, self.caster.as_ref(), metrics);
        let decision = engine.decide(&parsed, &meta, &ctx)?;

        let inserts = matches!(head.kind, StatementKind::Insert | StatementKind::Replace);
        if inserts && decision.scan_all {
            bail!(RouteError::not_supported(format!(
                "{:?} into {} whose rows do not pin a partition ({})",
                head.kind, head.table.text, decision.reason
            )));
        }

        let plan = RewritePlan::build(
            sql,
            head.sites.iter().chain(parsed.qualifier_sites.iter()).copied(),
        )?;

        let groups = if decision.scan_all {
            metrics.on_scan_all();
            all_shards(&meta)
        } else {
            group_targets(&meta, decision.targets.iter().copied())?
        };

        let statements = if inserts && groups.len() > 1 {
            let Some(rows) = engine.row_targets(&parsed, &meta, &ctx)? else {
                bail!(RouteError::not_supported(format!(
                    "{:?} spanning {} shards with rows that cannot be split",
                    head.kind,
                    groups.len()
                )));
            };
            ensure!(
                !parsed.positional_params,
                RouteError::not_supported("positional parameters in a batch split across shards")
            );
            self.split_rows(sql, &plan, &parsed, &meta, &rows)?
        } else {
            let params: Vec<u32> = (0..parsed.placeholder_count).collect();
            let mut statements = Vec::with_capacity(groups.len());
            for (location, partitions) in groups {
                let rewritten = plan.apply(sql, &location, self.config.quote_mode)?;
                statements.push(ShardStatement {
                    location,
                    partitions,
                    sql: rewritten,
                    params: params.clone(),
                });
            }
            statements
        };

        debug!(
            table = %head.table.text,
            scan_all = decision.scan_all,
            reason = %decision.reason,
            shards = statements.len(),
            placeholders = parsed.placeholder_count,
            "statement routed"
        );

        Ok(RouteOutcome {
            scan_all: decision.scan_all,
            reason: decision.reason,
            targets: decision.targets.into_iter().collect(),
            statements,
            placeholder_count: parsed.placeholder_count,
            batch_values_count: parsed.batch_values_count,
            syntax_issue_count: parsed.syntax_issues.len(),
        })
    }

    /// One statement per shard, each carrying only the tuples routed there.
    fn split_rows(
        &self,
        sql: &str,
        plan: &RewritePlan,
        parsed: &ExprParseResult<'_>,
        meta: &TableRouteMeta,
        rows: &[RouteTarget],
    ) -> Result<Vec<ShardStatement>> {
        let mut per_shard: BTreeMap<ShardLocation, (Vec<usize>, BTreeSet<RouteTarget>)> = BTreeMap::new();
        for (index, target) in rows.iter().enumerate() {
            let location = meta.shard_for(target.partition_id)?;
            let (keep, partitions) = per_shard.entry(location.clone()).or_default();
            keep.push(index);
            partitions.insert(*target);
        }

        let spans: Vec<Span> = parsed.value_rows.iter().map(|row| row.span).collect();
        let mut statements = Vec::with_capacity(per_shard.len());
        for (location, (keep, partitions)) in per_shard {
            let rewritten = plan.apply_rows(sql, &location, self.config.quote_mode, &spans, &keep)?;
            statements.push(ShardStatement {
                params: kept_params(parsed, &keep),
                location,
                partitions: partitions.into_iter().collect(),
                sql: rewritten,
            });
        }
        debug!(
            rows = rows.len(),
            shards = statements.len(),
            "batch split across shards"
        );
        Ok(statements)
    }
}

/// Parameter indexes used by a statement that keeps only the tuples in `keep`.
fn kept_params(parsed: &ExprParseResult<'_>, keep: &[usize]) -> Vec<u32> {
    let rows = &parsed.value_rows;
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return (0..parsed.placeholder_count).collect();
    };
    let mut params: Vec<u32> = (0..first.first_param).collect();
    for row in keep.iter().filter_map(|&index| rows.get(index)) {
        params.extend(row.first_param..row.first_param + row.param_count);
    }
    params.extend(last.first_param + last.param_count..parsed.placeholder_count);
    params
}

fn group_targets(
    meta: &TableRouteMeta,
    targets: impl Iterator<Item = RouteTarget>,
) -> Result<BTreeMap<ShardLocation, Vec<RouteTarget>>> {
    let mut groups: BTreeMap<ShardLocation, Vec<RouteTarget>> = BTreeMap::new();
    for target in targets {
        let location = meta.shard_for(target.partition_id)?;
        groups.entry(location.clone()).or_default().push(target);
    }
    Ok(groups)
}

fn all_shards(meta: &TableRouteMeta) -> BTreeMap<ShardLocation, Vec<RouteTarget>> {
    let mut groups: BTreeMap<ShardLocation, Vec<RouteTarget>> = BTreeMap::new();
    for (partition_id, location) in meta.shards() {
        groups.entry(location.clone()).or_default().push(RouteTarget {
            partition_id,
            tablet_id: None,
        });
    }
    groups
}
