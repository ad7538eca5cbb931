use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rigel_kdtree::KdTree;
use std::hint::black_box;

fn random_points(num_points: usize) -> Vec<[f64; 3]> {
    (0..num_points)
        .map(|_| {
            [
                rand::random::<f64>(),
                rand::random::<f64>(),
                rand::random::<f64>(),
            ]
        })
        .collect()
}

fn linear_nearest(points: &[[f64; 3]], query: &[f64; 3]) -> Option<(usize, f64)> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let dx = p[0] - query[0];
            let dy = p[1] - query[1];
            let dz = p[2] - query[2];
            (i, (dx * dx + dy * dy + dz * dz).sqrt())
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");

    for size in [1_000usize, 10_000, 100_000] {
        let points = random_points(size);
        let queries = random_points(100);
        let tree = KdTree::new(&points);

        group.bench_function(BenchmarkId::new("kdtree", size), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(tree.nearest(query));
                }
            })
        });

        group.bench_function(BenchmarkId::new("linear", size), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(linear_nearest(&points, query));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_nearest);
criterion_main!(benches);
