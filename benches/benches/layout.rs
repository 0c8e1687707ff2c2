use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use keybed_layout::{compute_geometry, GeometryCache, Point, SizingMode};

fn geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");

    group.bench_function("compute_1920x200", |b| {
        b.iter(|| compute_geometry(black_box(1920.0), black_box(200.0), 1.0, SizingMode::ExactFit));
    });

    group.bench_function("live_resize_hidpi", |b| {
        let mut cache = GeometryCache::new(SizingMode::PreferredAspect);
        let mut width = 800.0f32;
        b.iter(|| {
            width = if width > 2400.0 { 800.0 } else { width + 1.5 };
            cache.layout(black_box(width), 240.0, 0.5)
        });
    });

    group.finish();
}

fn hit_test(c: &mut Criterion) {
    let geometry = compute_geometry(1920.0, 200.0, 1.0, SizingMode::ExactFit);
    let points: Vec<Point> = (0..1024)
        .map(|i| Point::new((i as f32 * 7.3) % 1920.0, (i as f32 * 3.1) % 200.0))
        .collect();

    let mut group = c.benchmark_group("locate");
    group.bench_function("mixed_bands_1024_points", |b| {
        b.iter(|| {
            for point in &points {
                black_box(geometry.locate(*point));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, geometry, hit_test);
criterion_main!(benches);
