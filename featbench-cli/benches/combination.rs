use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use featbench::{run_combination, CombinationKey, GridConfig, Harness, InMemorySource, PipelineConfig};
use image::{GrayImage, Luma};

/// Scattered squares of varying brightness over a soft gradient
fn scene(size: u32, shift: u32) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
        let (sx, sy) = (x + shift, y + shift / 2);
        let cell = (sx / 20) * 7 + (sy / 20) * 13;
        if sx % 20 < 9 && sy % 20 < 9 && cell % 3 != 0 {
            Luma([120 + (cell % 5) as u8 * 25])
        } else {
            Luma([40 + (x * 30 / size) as u8])
        }
    })
}

fn bench_single_combination(c: &mut Criterion) {
    let mut group = c.benchmark_group("combination");
    group.sample_size(10);

    let query = scene(240, 0);
    let reference = scene(240, 6);
    let config = PipelineConfig::default();
    for key in [
        CombinationKey::new("ORB", "ORB", "BF"),
        CombinationKey::new("FAST", "BRIEF", "BF"),
        CombinationKey::new("FAST", "SIFT", "FLANN"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(&key), &key, |b, key| {
            b.iter(|| black_box(run_combination(black_box(&query), black_box(&reference), key, &config).ok()))
        });
    }
    group.finish();
}

fn bench_small_grid(c: &mut Criterion) {
    let source = InMemorySource::new(scene(160, 0), scene(160, 4));
    let grid = GridConfig {
        detectors: vec!["FAST".into(), "ORB".into()],
        ..GridConfig::default()
    };
    c.bench_function("grid_fast_orb", |b| {
        b.iter(|| {
            let mut harness = Harness::new(PipelineConfig::default());
            black_box(harness.run_grid(&source, &grid).unwrap())
        })
    });
}

criterion_group!(benches, bench_single_combination, bench_small_grid);
criterion_main!(benches);
