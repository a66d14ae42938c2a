//! Benchmarks for route matching throughput.
//!
//! Matching runs once per request on the hot path, so the scan over the
//! route table and the predicate tree evaluation are the operations worth
//! watching as route counts grow.

use criterion::{criterion_group, criterion_main, Criterion};
use grand_central::events::TracingObserver;
use grand_central::predicate::builtin::{MethodPredicate, PathPredicate};
use grand_central::{
    AsyncPredicate, Exchange, Route, RouteId, RouteMatcher, RoutePredicate, RouteTable,
};
use http::{HeaderMap, Method};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn table_with(route_count: usize) -> RouteTable {
    let routes = (0..route_count)
        .map(|index| {
            let path = PathPredicate::new(&format!("/service-{index}/**")).expect("valid pattern");
            let method = MethodPredicate::new([Method::GET, Method::POST]);
            let predicate = AsyncPredicate::of(path).and(&AsyncPredicate::of(method));
            Route::builder(RouteId::try_new(format!("route-{index}")).expect("non-empty id"))
                .predicate(predicate)
                .build()
                .expect("valid route")
        })
        .collect();
    RouteTable::new(routes)
}

fn bench_route_matching(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("route_matching");

    for route_count in &[10usize, 100, 500] {
        let matcher = RouteMatcher::new(
            Arc::new(table_with(*route_count)),
            Arc::new(TracingObserver),
        );
        let last = route_count - 1;

        group.bench_function(format!("last_of_{route_count}"), |b| {
            b.to_async(&runtime).iter(|| {
                let matcher = &matcher;
                async move {
                    let exchange = Exchange::new(
                        Method::GET,
                        format!("/service-{last}/users").parse().expect("valid uri"),
                        HeaderMap::new(),
                    );
                    black_box(matcher.match_route(&exchange).await)
                }
            });
        });
    }

    group.finish();
}

fn bench_predicate_trees(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("predicate_trees");

    let wide = (0..32)
        .map(|index| {
            AsyncPredicate::from_sync(RoutePredicate::from_fn(format!("leaf-{index}"), |_| {
                Ok(false)
            }))
        })
        .reduce(|left, right| left.or(&right))
        .expect("non-empty tree");

    group.bench_function("or_tree_32_leaves_all_false", |b| {
        b.to_async(&runtime).iter(|| {
            let wide = &wide;
            async move {
                let exchange = Exchange::new(
                    Method::GET,
                    "/".parse().expect("valid uri"),
                    HeaderMap::new(),
                );
                black_box(wide.apply(&exchange).await)
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_route_matching, bench_predicate_trees);
criterion_main!(benches);
