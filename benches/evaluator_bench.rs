//! Criterion benchmarks for the snapexpr evaluator.
//!
//! Parsing happens once outside the timed loop; each iteration builds a
//! fresh `Evaluator` so scope setup is included in the measurement.
//!
//! Run:
//!   cargo bench
//!   cargo bench -- paths          # one group
//!   cargo bench -- match_patterns # one group

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use snapexpr::ast::AstNode;
use snapexpr::evaluator::Evaluator;
use snapexpr::parser;
use snapexpr::value::JValue;

// ── Data builders ─────────────────────────────────────────────────────────────

/// `{"values": [0, 1, ..., n-1]}`
fn numeric_array(n: usize) -> JValue {
    let values: Vec<JValue> = (0..n).map(|i| JValue::from(i as f64)).collect();
    let mut root = IndexMap::new();
    root.insert("values".to_string(), JValue::array(values));
    JValue::object(root)
}

/// 100 products: {id, name, category, price, inStock, tags, vendor}.
fn products_100() -> JValue {
    let categories = ["Electronics", "Clothing", "Books", "Home"];
    let products: Vec<JValue> = (0..100_usize)
        .map(|i| {
            let tags: Vec<JValue> = (0..i % 5)
                .map(|j| JValue::string(format!("tag{j}")))
                .collect();

            let mut vendor = IndexMap::new();
            vendor.insert(
                "name".to_string(),
                JValue::string(format!("Vendor {}", i % 10)),
            );

            let mut p = IndexMap::new();
            p.insert("id".to_string(), JValue::from(i as f64));
            p.insert("name".to_string(), JValue::string(format!("Product {i}")));
            p.insert("category".to_string(), JValue::string(categories[i % 4]));
            p.insert("price".to_string(), JValue::from(10.0 + i as f64 * 5.5));
            p.insert("inStock".to_string(), JValue::Bool(i % 3 != 0));
            p.insert("tags".to_string(), JValue::array(tags));
            p.insert("vendor".to_string(), JValue::object(vendor));
            JValue::object(p)
        })
        .collect();

    let mut root = IndexMap::new();
    root.insert("products".to_string(), JValue::array(products));
    JValue::object(root)
}

/// Nested catalog for descendant scans: four levels of `{"child": ..., "price": n}`.
fn nested_catalog(depth: usize) -> JValue {
    let mut node = IndexMap::new();
    node.insert("price".to_string(), JValue::from(depth as f64));
    let mut current = JValue::object(node);
    for level in (0..depth).rev() {
        let mut m = IndexMap::new();
        m.insert("price".to_string(), JValue::from(level as f64));
        m.insert("child".to_string(), current);
        current = JValue::object(m);
    }
    current
}

// ── Helper: evaluate expression on data ───────────────────────────────────────

#[inline]
fn eval(ast: &AstNode, data: &JValue) -> JValue {
    Evaluator::new().evaluate(ast, data).unwrap()
}

// ── Bench groups ──────────────────────────────────────────────────────────────

fn bench_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("paths");
    group.sample_size(300);

    {
        let ast = parser::parse("$.user.name").unwrap();
        let data = JValue::from_json_str(r#"{"user":{"name":"Alice","age":30}}"#).unwrap();
        group.bench_function("simple_path", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    {
        let ast = parser::parse("$.a.b.c.d.e").unwrap();
        let data = JValue::from_json_str(r#"{"a":{"b":{"c":{"d":{"e":42}}}}}"#).unwrap();
        group.bench_function("deep_path_5", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    {
        let data = products_100();
        let ast = parser::parse("$.products[*].price").unwrap();
        group.bench_function("wildcard_field_100", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    {
        let data = products_100();
        let ast = parser::parse("$.products[?(@.price > 300 && @.inStock == true)].name").unwrap();
        group.bench_function("filter_100", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    for depth in [4_usize, 16] {
        let data = nested_catalog(depth);
        let ast = parser::parse("$..price").unwrap();
        group.bench_with_input(BenchmarkId::new("descendant", depth), &data, |b, d| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(d))))
        });
    }

    group.finish();
}

fn bench_array_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_methods");

    for n in [100_usize, 1000, 10000] {
        let data = numeric_array(n);
        let ast_sum = parser::parse("$.values.reduce((acc, x) => acc + x, 0)").unwrap();
        let ast_map = parser::parse("$.values.map(x => x * 2)").unwrap();

        group.bench_with_input(BenchmarkId::new("reduce_sum", n), &data, |b, d| {
            b.iter(|| black_box(eval(black_box(&ast_sum), black_box(d))))
        });
        group.bench_with_input(BenchmarkId::new("map_double", n), &data, |b, d| {
            b.iter(|| black_box(eval(black_box(&ast_map), black_box(d))))
        });
    }

    {
        let data = products_100();
        let ast = parser::parse("$.products.sort((a, b) => b.price - a.price)[0].name").unwrap();
        group.bench_function("sort_by_price_100", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    {
        let data = products_100();
        let ast = parser::parse("$.products.filter(p => p.category == 'Books').length").unwrap();
        group.bench_function("filter_count_100", |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    group.finish();
}

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("strings");
    group.sample_size(300);

    let data = JValue::from_json_str(
        r#"{"first":"Ada","last":"Lovelace","csv":"a,b,c,d,e,f,g,h"}"#,
    )
    .unwrap();

    let cases = [
        ("concat", "$.first + ' ' + $.last"),
        ("upper_trim", "('  ' + $.last + '  ').trim().toUpperCase()"),
        ("split_join", "$.csv.split(',').join('|')"),
        ("regex_replace", "$.csv.replace(/[aeiou]/g, '*')"),
        ("sprintf", "'%s has %s letters'.sprintf($.last, $.last.length)"),
    ];
    for (name, expr) in cases {
        let ast = parser::parse(expr).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    group.finish();
}

fn bench_match_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_patterns");
    group.sample_size(300);

    let ast = parser::parse(
        r#"match $.event {
            { type: 'click', target!: _ } => 'click on ' + $.event.target,
            { type: 'key', code: "13..20" } => 'enter-ish',
            [_, ...] => 'batch of ' + $.event.length,
            /^err/ => 'error',
            _ => 'other'
        }"#,
    )
    .unwrap();

    let inputs = [
        ("object_first_arm", r#"{"event":{"type":"click","target":"btn"}}"#),
        ("object_range_arm", r#"{"event":{"type":"key","code":15}}"#),
        ("array_rest_arm", r#"{"event":[1,2,3,4]}"#),
        ("fallback_arm", r#"{"event":42}"#),
    ];
    for (name, json) in inputs {
        let data = JValue::from_json_str(json).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(eval(black_box(&ast), black_box(&data))))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let expressions = [
        ("path", "$.products[?(@.price > 100)].vendor.name"),
        ("lambda_chain", "$.a.map(x => x * 2).filter(x => x > 3).reduce((a, b) => a + b, 0)"),
        ("object_literal", "{ id: $.id, name: $.first + ' ' + $.last, tags: [$.a, $.b, $.c] }"),
    ];
    for (name, expr) in expressions {
        group.bench_function(name, |b| b.iter(|| black_box(parser::parse(black_box(expr)).unwrap())));
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_paths,
    bench_array_methods,
    bench_strings,
    bench_match_patterns,
    bench_parse,
);
criterion_main!(benches);
