//! # Routing Scenario Tests
//!
//! End-to-end checks through `ShardRouter` on a small sharded schema:
//!
//! | table          | partitioning                       | shards            |
//! |----------------|------------------------------------|-------------------|
//! | shop.orders    | KEY(id), 4 partitions              | shop_0 .. shop_3  |
//! | shop.events    | KEY(tenant) 2 x HASH(day) 2        | one per partition |
//! | shop.accounts  | KEY(email) varchar, general_ci, 8  | shop_0 .. shop_7  |
//!
//! ## Test Coverage
//!
//! 1. Relation extraction
//!    - single equality, operand reversal, `!=`, BETWEEN, IN
//!    - malformed fragments keep what was parsed
//!
//! 2. Decisions
//!    - single shard, multi shard, scan-all reasons
//!    - two-level tables, string keys, prepared parameters
//!    - batch INSERT split per shard, keyless INSERT refused
//!
//! 3. Rewrite
//!    - database prefix, qualified column references, hints, ANSI quoting

use std::sync::Arc;

use bumpalo::Bump;
use keyroute::config::{NameCase, QuoteMode};
use keyroute::partition::{PartDescKey, PartFuncType};
use keyroute::schema::{RouteCatalog, ShardLocation, TableRouteMeta};
use keyroute::sql::{CompareOp, ExprParser, PartKeyMatcher, PartLevel, StatementHead, TokenKind};
use keyroute::types::{Collation, ColumnType, Literal};
use keyroute::{ClusterVersion, DecisionReason, ErrorKind, RouteContext, RouteError, RouterConfig, ShardRouter};

fn orders() -> TableRouteMeta {
    let first = PartDescKey::builder(4, PartFuncType::Key, ColumnType::bigint())
        .build()
        .unwrap();
    TableRouteMeta::builder("shop", "orders", first)
        .part_key("id", 0, PartLevel::One)
        .shards((0..4).map(|p| (p, ShardLocation::new(format!("shop_{}", p), "orders"))))
        .build()
        .unwrap()
}

fn events() -> TableRouteMeta {
    let first = PartDescKey::builder(2, PartFuncType::KeyV3, ColumnType::bigint())
        .build()
        .unwrap();
    let sub = PartDescKey::builder(2, PartFuncType::Hash, ColumnType::int())
        .level(PartLevel::Two)
        .tablet_ids(vec![7001, 7002])
        .build()
        .unwrap();
    let mut builder = TableRouteMeta::builder("shop", "events", first)
        .part_key("tenant", 1, PartLevel::One)
        .part_key("day", 2, PartLevel::Two)
        .sub_partition(sub);
    for first_id in 0..2u64 {
        for second_id in 0..2u64 {
            let id = (first_id << 28) | second_id;
            builder = builder.shard(id, ShardLocation::new(format!("ev_{}_{}", first_id, second_id), "events"));
        }
    }
    builder.build().unwrap()
}

fn accounts() -> TableRouteMeta {
    let first = PartDescKey::builder(8, PartFuncType::Key, ColumnType::varchar(64))
        .collation(Collation::Utf8mb4GeneralCi)
        .build()
        .unwrap();
    TableRouteMeta::builder("shop", "accounts", first)
        .part_key("email", 0, PartLevel::One)
        .shards((0..8).map(|p| (p, ShardLocation::new(format!("shop_{}", p), "accounts"))))
        .build()
        .unwrap()
}

fn router_with(config: RouterConfig) -> ShardRouter {
    let catalog = Arc::new(RouteCatalog::new(NameCase::Insensitive));
    catalog.install(orders());
    catalog.install(events());
    catalog.install(accounts());
    ShardRouter::new(config, catalog).unwrap()
}

fn router() -> ShardRouter {
    router_with(RouterConfig::default())
}

fn ctx() -> RouteContext<'static> {
    RouteContext::new(ClusterVersion::V4).with_default_database("shop")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Relation Extraction
// ============================================================================

#[test]
fn test_single_equality_relation() {
    let meta = orders();
    let sql = "SELECT * FROM T WHERE id=1001";
    let config = RouterConfig::default();
    let bump = Bump::new();
    let metrics = keyroute::NoopMetrics;
    let head = StatementHead::scan(sql, config.quote_mode).unwrap();
    let matcher = PartKeyMatcher::new(&meta, None, config.name_case);
    let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, &metrics, &config)
        .parse()
        .unwrap();

    assert_eq!(parsed.relations.len(), 1);
    let rel = parsed.relation(parsed.relations[0]);
    assert_eq!(parsed.column_of(rel).unwrap().name, "id");
    assert_eq!(rel.op, CompareOp::Eq);
    assert_eq!(parsed.value_of(rel), Some(&TokenKind::Int(1001)));
}

#[test]
fn test_scenario_point_lookup() {
    let outcome = router()
        .route("SELECT * FROM orders WHERE id=1001", &ctx())
        .unwrap();
    assert!(!outcome.scan_all);
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![3]);
    assert_eq!(outcome.statements.len(), 1);
    assert_eq!(
        outcome.statements[0].sql,
        "SELECT * FROM `shop_3`.orders WHERE id=1001"
    );
}

#[test]
fn test_scenario_in_list_is_multi_shard() {
    let outcome = router()
        .route("SELECT * FROM orders WHERE id IN (1, 42, 1001)", &ctx())
        .unwrap();
    assert!(!outcome.scan_all);
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![0, 2, 3]);
    assert_eq!(outcome.statements.len(), 3);
}

#[test]
fn test_reversed_operand_routes_like_forward() {
    let router = router();
    let forward = router.route("SELECT * FROM orders WHERE id = 42", &ctx()).unwrap();
    let reversed = router.route("SELECT * FROM orders WHERE 42 = id", &ctx()).unwrap();
    assert_eq!(forward.targets, reversed.targets);
}

#[test]
fn test_not_equal_scans_all() {
    let outcome = router()
        .route("SELECT * FROM orders WHERE id != 5", &ctx())
        .unwrap();
    assert!(outcome.scan_all);
    assert_eq!(outcome.reason, DecisionReason::NoPartitionKeyPredicate);
    assert_eq!(outcome.statements.len(), 4);
}

#[test]
fn test_malformed_where_does_not_fail() {
    init_tracing();
    let outcome = router()
        .route("SELECT * FROM orders WHERE id = 1001 AND ((v = 3", &ctx())
        .unwrap();
    assert_eq!(outcome.syntax_issue_count, 1);
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![3]);

    let strict = router_with(RouterConfig::builder().route_on_partial_parse(false).build().unwrap());
    let outcome = strict
        .route("SELECT * FROM orders WHERE id = 1001 AND ((v = 3", &ctx())
        .unwrap();
    assert!(outcome.scan_all);
    assert_eq!(outcome.reason, DecisionReason::PartialParse);
}

#[test]
fn test_deeply_nested_where_is_a_syntax_issue() {
    let router = router();
    let sql = format!("SELECT * FROM orders WHERE id = 1001 AND {}v = 1", "(".repeat(10_000));
    let outcome = router.route(&sql, &ctx()).unwrap();
    assert_eq!(outcome.syntax_issue_count, 1);
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![3]);

    let sql = format!("SELECT * FROM orders WHERE {}id = 1", "NOT ".repeat(200_000));
    let outcome = router.route(&sql, &ctx()).unwrap();
    assert_eq!(outcome.syntax_issue_count, 1);
    assert!(outcome.scan_all);
}

#[test]
fn test_join_condition_contributes() {
    let outcome = router()
        .route(
            "SELECT o.* FROM orders o JOIN items i ON i.order_id = o.id AND o.id = 42 WHERE i.qty > 1",
            &ctx(),
        )
        .unwrap();
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![0]);
}

// ============================================================================
// Decisions
// ============================================================================

#[test]
fn test_two_level_table() {
    let outcome = router()
        .route("SELECT * FROM events WHERE tenant = 1 AND day = 3", &ctx())
        .unwrap();
    assert!(!outcome.scan_all);
    assert_eq!(outcome.targets.len(), 1);
    let target = outcome.targets[0];
    assert_eq!(target.partition_id & ((1 << 28) - 1), 1);
    assert_eq!(target.tablet_id, Some(7002));

    let outcome = router()
        .route("SELECT * FROM events WHERE tenant = 1", &ctx())
        .unwrap();
    assert!(outcome.scan_all);
    assert_eq!(outcome.statements.len(), 4);
}

#[test]
fn test_string_key_with_case_insensitive_collation() {
    let router = router();
    let lower = router
        .route("SELECT * FROM accounts WHERE email = 'hello'", &ctx())
        .unwrap();
    let upper = router
        .route("SELECT * FROM accounts WHERE EMAIL = 'HELLO'", &ctx())
        .unwrap();
    assert_eq!(lower.partition_ids().collect::<Vec<_>>(), vec![6]);
    assert_eq!(lower.targets, upper.targets);
}

#[test]
fn test_prepared_insert() {
    let params = [Literal::Int(1), Literal::Str("a"), Literal::Int(1001), Literal::Str("b")];
    let ctx = ctx().with_params(&params);
    let outcome = router()
        .route("INSERT INTO orders (id, note) VALUES (?, ?), (?, ?)", &ctx)
        .unwrap();
    assert_eq!(outcome.placeholder_count, 4);
    assert_eq!(outcome.batch_values_count, 2);
    assert_eq!(outcome.partition_ids().collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(outcome.statements.len(), 2);
    assert_eq!(
        outcome.statements[0].sql,
        "INSERT INTO `shop_2`.orders (id, note) VALUES (?, ?)"
    );
    assert_eq!(outcome.statements[0].params, vec![0, 1]);
    assert_eq!(
        outcome.statements[1].sql,
        "INSERT INTO `shop_3`.orders (id, note) VALUES (?, ?)"
    );
    assert_eq!(outcome.statements[1].params, vec![2, 3]);
}

#[test]
fn test_batch_insert_sends_each_row_once() {
    let outcome = router()
        .route(
            "INSERT INTO shop.orders (id, note) VALUES (1, 'a'), (42, 'b') ON DUPLICATE KEY UPDATE note = 'c'",
            &ctx(),
        )
        .unwrap();
    let sqls: Vec<&str> = outcome.statements.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sqls,
        vec![
            "INSERT INTO shop_0.orders (id, note) VALUES (42, 'b') ON DUPLICATE KEY UPDATE note = 'c'",
            "INSERT INTO shop_2.orders (id, note) VALUES (1, 'a') ON DUPLICATE KEY UPDATE note = 'c'",
        ]
    );
}

#[test]
fn test_keyless_insert_is_refused() {
    let err = router()
        .route("INSERT INTO orders (note) VALUES ('a')", &ctx())
        .unwrap_err();
    assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::NotSupported));
}

#[test]
fn test_disjunction_scans_all() {
    let outcome = router()
        .route("DELETE FROM orders WHERE id = 1 OR note = 'x'", &ctx())
        .unwrap();
    assert!(outcome.scan_all);
    assert_eq!(outcome.reason, DecisionReason::Disjunction);
}

#[test]
fn test_strict_accuracy_degrades_lossy_values() {
    init_tracing();
    let loose = router()
        .route("SELECT * FROM orders WHERE id = 1.5", &ctx())
        .unwrap();
    assert!(!loose.scan_all);

    let strict = router_with(RouterConfig::builder().strict_accuracy(true).build().unwrap())
        .route("SELECT * FROM orders WHERE id = 1.5", &ctx())
        .unwrap();
    assert!(strict.scan_all);
}

#[test]
fn test_overflowing_literal_is_reported() {
    let err = router()
        .route("SELECT * FROM orders WHERE id = 99999999999999999999", &ctx())
        .unwrap_err();
    assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::Overflow));
}

// ============================================================================
// Rewrite
// ============================================================================

#[test]
fn test_update_rewrites_all_sites() {
    let outcome = router()
        .route(
            "UPDATE /*+ INDEX(orders idx_note) */ shop.orders SET orders.note = 'x' WHERE shop.orders.id = 42",
            &ctx(),
        )
        .unwrap();
    assert_eq!(
        outcome.statements[0].sql,
        "UPDATE /*+ INDEX(orders idx_note) */ shop_0.orders SET orders.note = 'x' WHERE shop_0.orders.id = 42"
    );
}

#[test]
fn test_alias_is_left_alone() {
    let outcome = router()
        .route("SELECT o.id FROM shop.orders AS o WHERE o.id = 42", &ctx())
        .unwrap();
    assert_eq!(
        outcome.statements[0].sql,
        "SELECT o.id FROM shop_0.orders AS o WHERE o.id = 42"
    );
}

#[test]
fn test_ansi_quotes() {
    let router = router_with(RouterConfig::builder().quote_mode(QuoteMode::Ansi).build().unwrap());
    let outcome = router
        .route("SELECT * FROM \"orders\" WHERE \"id\" = 1001", &ctx())
        .unwrap();
    assert_eq!(
        outcome.statements[0].sql,
        "SELECT * FROM \"shop_3\".\"orders\" WHERE \"id\" = 1001"
    );
}
