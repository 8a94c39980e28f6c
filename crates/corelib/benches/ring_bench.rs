//! Ring lookup benchmarks.

use corelib::node::Node;
use corelib::ring::HashRing;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn build_ring(nodes: usize, vnodes: usize) -> HashRing {
    let ring = HashRing::new();
    for i in 0..nodes {
        let id = format!("node{}", i);
        ring.add_node(Node::new(id.as_str(), format!("http://{}", id)), vnodes);
    }
    ring
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for nodes in [3usize, 16, 64] {
        let ring = build_ring(nodes, 100);
        group.bench_with_input(BenchmarkId::new("lookup", nodes), &ring, |b, ring| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                black_box(ring.lookup(format!("key{}", i).as_bytes()))
            })
        });
        group.bench_with_input(BenchmarkId::new("lookup_n_3", nodes), &ring, |b, ring| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                black_box(ring.lookup_n(format!("key{}", i).as_bytes(), 3))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
