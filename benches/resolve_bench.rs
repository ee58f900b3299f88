//! Resolution benchmarks using Criterion.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure:
//! - Transitive closure over link chains of growing length
//! - Re-resolution against a warm cache
//! - Planning long path queries

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reasoner::{
    Atom, ConceptId, InferenceRule, MemoryGraph, Query, ReasonerConfig, RolePlayer, RuleStore,
    Session, SymbolStore, Var,
};
use std::sync::Arc;

fn link(symbols: &SymbolStore, x: Var, y: Var) -> Atom {
    Atom::relation(
        symbols.intern("link"),
        [
            RolePlayer::new(symbols.intern("from"), x),
            RolePlayer::new(symbols.intern("to"), y),
        ],
    )
}

/// A chain of `len` nodes joined by `link` facts, with the transitivity rule.
fn chain(len: usize) -> (Arc<SymbolStore>, Session, Vec<ConceptId>) {
    let symbols = Arc::new(SymbolStore::new());
    let graph = Arc::new(MemoryGraph::new(Arc::clone(&symbols)));
    let nodes: Vec<ConceptId> = (0..len).map(|_| graph.insert_entity("node")).collect();
    for pair in nodes.windows(2) {
        graph.insert_relation("link", &[("from", pair[0]), ("to", pair[1])]);
    }
    let (x, y, z) = (
        Var::named(&symbols, "rx"),
        Var::named(&symbols, "ry"),
        Var::named(&symbols, "rz"),
    );
    let mut rules = RuleStore::new();
    rules.add(InferenceRule::new(
        "link-transitivity",
        Query::new([link(&symbols, x, z), link(&symbols, z, y)]),
        link(&symbols, x, y),
    ));
    let session = Session::new(graph, Arc::new(rules));
    (symbols, session, nodes)
}

/// Benchmark cold resolution of the full closure.
fn bench_transitive_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_closure");

    for len in [4usize, 8, 16] {
        let (symbols, session, _) = chain(len);
        let query = Query::new([link(
            &symbols,
            Var::named(&symbols, "x"),
            Var::named(&symbols, "y"),
        )]);
        group.bench_with_input(BenchmarkId::new("nodes", len), &len, |b, _| {
            b.iter(|| {
                session.clear_cache();
                let answers = session.resolve_all(black_box(&query)).unwrap();
                black_box(answers.len())
            })
        });
    }

    group.finish();
}

/// Benchmark a bound query answered from a complete cache entry.
fn bench_warm_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_cache");

    for len in [8usize, 16] {
        let (symbols, session, nodes) = chain(len);
        let (x, y) = (Var::named(&symbols, "x"), Var::named(&symbols, "y"));
        session.resolve_all(&Query::new([link(&symbols, x, y)])).unwrap();
        let bound = Query::new([link(&symbols, x, y), Atom::id(x, nodes[0])]);
        group.bench_with_input(BenchmarkId::new("nodes", len), &len, |b, _| {
            b.iter(|| black_box(session.resolve_all(black_box(&bound)).unwrap().len()))
        });
    }

    group.finish();
}

/// Benchmark planning of `link(v0, v1), link(v1, v2), ...` anchored at the far end.
fn bench_plan_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_path");

    for atoms in [4usize, 8, 16] {
        let (symbols, session, nodes) = chain(2);
        let session = session.with_config(ReasonerConfig::without_inference());
        let vars: Vec<Var> = (0..=atoms)
            .map(|i| Var::named(&symbols, &format!("v{i}")))
            .collect();
        let query = Query::new(
            vars.windows(2)
                .map(|w| link(&symbols, w[0], w[1]))
                .chain([Atom::id(vars[atoms], nodes[1])]),
        );
        group.bench_with_input(BenchmarkId::new("atoms", atoms), &atoms, |b, _| {
            b.iter(|| black_box(session.plan(black_box(&query)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_transitive_closure,
    bench_warm_cache,
    bench_plan_path
);
criterion_main!(benches);
