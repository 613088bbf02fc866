use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::BenchmarkId;
use std::sync::Arc;

use voxelview::data::colormap::{models, Bundle, ColormapRegistry};

/// Regenerating the full table for a few models and settings.
fn criterion_benchmark_regenerate(c : &mut Criterion) {
    let registry = Arc::new(ColormapRegistry::new());
    let ramp : Vec<u8> = (0..=255).collect();
    let user = registry.register(&ramp, &ramp.iter().rev().copied().collect::<Vec<_>>(), &ramp).unwrap();

    let mut bundle = Bundle::new(Arc::clone(&registry), [64, 64, 8], 3);
    let mut table_bench = c.benchmark_group("Colormap regeneration");

    for (name, model) in [
        ("gray", models::GRAY),
        ("rainbow", models::RAINBOW),
        ("random", models::RANDOM),
        ("user table", models::BUILTIN_MODELS + user),
    ] {
        bundle.set_model(model);
        table_bench.bench_with_input(BenchmarkId::new("Plain", name), &model, |bench, _| {
            bench.iter(|| {
                bundle.regenerate();
                black_box(bundle.table()[1000])
            })
        });
    }

    bundle.set_model(models::GLOW_RED);
    bundle.set_gamma(0.5);
    bundle.toggle_over_under(Some(true));
    bundle.set_clip(2000, 30000);
    table_bench.bench_function("Glow red, gamma, clipped", |bench| {
        bench.iter(|| {
            bundle.regenerate();
            black_box(bundle.table()[1000])
        })
    });
    bundle.toggle_log(Some(true));
    bundle.toggle_inverse(Some(true));
    table_bench.bench_function("Glow red, log, inverse", |bench| {
        bench.iter(|| {
            bundle.regenerate();
            black_box(bundle.table()[1000])
        })
    });
    table_bench.finish();
}

criterion_group!(benches, criterion_benchmark_regenerate);
criterion_main!(benches);
