//! Fuzz testing for the routing path.
//!
//! Feeds arbitrary statement text through `ShardRouter::route` with a small
//! relation cap and parse budget. Any input may fail with an error, but none
//! may panic, and a successful outcome must name at least one shard.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keyroute::partition::{PartDescKey, PartFuncType};
use keyroute::schema::{RouteCatalog, ShardLocation, TableRouteMeta};
use keyroute::sql::PartLevel;
use keyroute::types::{ColumnType, Literal};
use keyroute::{ClusterVersion, QuoteMode, RouteContext, RouterConfig, ShardRouter};

#[derive(Debug, Arbitrary)]
struct RouteInput {
    fragment: String,
    ansi_quotes: bool,
    legacy_cluster: bool,
    max_relations: u8,
    params: Vec<i64>,
}

fn router(quote_mode: QuoteMode, max_relations: usize) -> Option<ShardRouter> {
    let first = PartDescKey::builder(4, PartFuncType::Key, ColumnType::bigint())
        .build()
        .ok()?;
    let meta = TableRouteMeta::builder("shop", "orders", first)
        .part_key("id", 0, PartLevel::One)
        .shards((0..4).map(|p| (p, ShardLocation::new(format!("shop_{}", p), "orders"))))
        .build()
        .ok()?;
    let catalog = Arc::new(RouteCatalog::default());
    catalog.install(meta);
    let config = RouterConfig::builder()
        .quote_mode(quote_mode)
        .max_relations(max_relations)
        .max_parse_nodes(64)
        .build()
        .ok()?;
    ShardRouter::new(config, catalog).ok()
}

fuzz_target!(|input: RouteInput| {
    let quote_mode = if input.ansi_quotes { QuoteMode::Ansi } else { QuoteMode::Mysql };
    let max_relations = usize::from(input.max_relations.max(1));
    let Some(router) = router(quote_mode, max_relations) else {
        return;
    };

    let params: Vec<Literal<'_>> = input.params.iter().map(|&v| Literal::Int(v)).collect();
    let version = if input.legacy_cluster { ClusterVersion::V3 } else { ClusterVersion::V4 };
    let ctx = RouteContext::new(version)
        .with_default_database("shop")
        .with_params(&params);

    let sql = format!("SELECT * FROM orders WHERE {}", input.fragment);
    if let Ok(outcome) = router.route(&sql, &ctx) {
        assert!(!outcome.statements.is_empty());
    }
});
