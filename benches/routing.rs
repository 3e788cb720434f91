//! Routing benchmarks for keyroute
//!
//! These benchmarks measure the per-statement cost on the proxy hot path:
//! the raw partition hashes, the fragment parser on its own, and the full
//! `ShardRouter::route` call including rewrite.

use std::hint::black_box as hint_black_box;
use std::sync::Arc;

use bumpalo::Bump;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keyroute::partition::{legacy_hash, murmurhash64a, PartDescKey, PartFuncType};
use keyroute::schema::{RouteCatalog, ShardLocation, TableRouteMeta};
use keyroute::sql::{ExprParser, PartKeyMatcher, PartLevel, StatementHead};
use keyroute::types::ColumnType;
use keyroute::{ClusterVersion, NoopMetrics, RouteContext, RouterConfig, ShardRouter};

fn orders() -> TableRouteMeta {
    let first = PartDescKey::builder(64, PartFuncType::Key, ColumnType::bigint())
        .build()
        .unwrap();
    TableRouteMeta::builder("shop", "orders", first)
        .part_key("id", 0, PartLevel::One)
        .shards((0..64).map(|p| (p, ShardLocation::new(format!("shop_{}", p % 8), format!("orders_{}", p)))))
        .build()
        .unwrap()
}

fn statements() -> Vec<(&'static str, String)> {
    let in_list = (0..32).map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
    vec![
        ("point", "SELECT * FROM orders WHERE id = 1001".to_string()),
        (
            "conjunction",
            "SELECT o.id, o.note FROM shop.orders o WHERE o.status = 'paid' AND o.id = 42 AND o.amount > 10.5 ORDER BY o.id LIMIT 10"
                .to_string(),
        ),
        ("in_list_32", format!("SELECT * FROM orders WHERE id IN ({})", in_list)),
        ("scan_all", "SELECT * FROM orders WHERE note LIKE 'a%'".to_string()),
        (
            "insert_batch",
            "INSERT INTO orders (id, note) VALUES (1, 'a'), (2, 'b'), (3, 'c'), (4, 'd')".to_string(),
        ),
    ]
}

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");

    for len in [8usize, 32, 256] {
        let data = vec![0x5au8; len];
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("murmur", len), &data, |b, data| {
            b.iter(|| hint_black_box(murmurhash64a(black_box(data), 0)));
        });
        group.bench_with_input(BenchmarkId::new("legacy", len), &data, |b, data| {
            b.iter(|| hint_black_box(legacy_hash(black_box(data))));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let meta = orders();
    let config = RouterConfig::default();
    let metrics = NoopMetrics;

    for (name, sql) in statements() {
        group.bench_with_input(BenchmarkId::new("fragment", name), &sql, |b, sql| {
            let mut bump = Bump::new();
            b.iter(|| {
                bump.reset();
                let head = StatementHead::scan(sql, config.quote_mode).unwrap();
                let matcher = PartKeyMatcher::new(&meta, head.alias.map(|a| a.text), config.name_case);
                let parsed = ExprParser::for_statement(sql, &head, matcher, &bump, &metrics, &config)
                    .parse()
                    .unwrap();
                hint_black_box(parsed.relations.len())
            });
        });
    }

    group.finish();
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    let catalog = Arc::new(RouteCatalog::default());
    catalog.install(orders());
    let router = ShardRouter::new(RouterConfig::default(), catalog).unwrap();
    let ctx = RouteContext::new(ClusterVersion::V4).with_default_database("shop");

    for (name, sql) in statements() {
        group.bench_with_input(BenchmarkId::new("end_to_end", name), &sql, |b, sql| {
            b.iter(|| hint_black_box(router.route(black_box(sql), &ctx).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash, bench_parse, bench_route);
criterion_main!(benches);
