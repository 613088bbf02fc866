use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::BenchmarkId;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::sync::Arc;

use voxelview::data::colormap::ColormapRegistry;
use voxelview::data::voxel::HistogramSources;
use voxelview::{Arithmetic, DataType, Dataset, Element, ElementId, ViewerConfig};

const EXTENT : [usize; 3] = [256, 256, 16];

/// Two Short elements of uniform noise.
fn noisy_dataset() -> Dataset {
    let mut dataset = Dataset::new(
        EXTENT,
        DataType::Short,
        2,
        1,
        ViewerConfig::default(),
        Arc::new(ColormapRegistry::new()),
    );
    let mut rng = StdRng::seed_from_u64(7);
    for e in 0..2 {
        let buffer = dataset.element_mut(ElementId(e), 0).unwrap();
        for z in 0..EXTENT[2] {
            for y in 0..EXTENT[1] {
                for x in 0..EXTENT[0] {
                    buffer.set_value(x, y, z, rng.gen_range(0.0..255.0));
                }
            }
        }
    }
    dataset.update_min_max(ElementId(0)).unwrap();
    dataset.update_min_max(ElementId(1)).unwrap();
    dataset
}

/// Joint histograms at a few bin counts, then a full-volume
/// arithmetic pass between the two elements.
fn criterion_benchmark_histograms(c : &mut Criterion) {
    let dataset = noisy_dataset();
    let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };

    let mut hist_bench = c.benchmark_group("Histogram benchmarks");
    for bins in [64usize, 256] {
        let mut hist = dataset.histogram_buffer(&sources, [bins, bins, 1], 0).unwrap();
        hist_bench.bench_with_input(
            BenchmarkId::new("2d histogram of 1M voxels", bins),
            &bins,
            |bench, _| {
                bench.iter(|| black_box(dataset.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap()))
            },
        );
    }
    hist_bench.finish();

    let mut dataset = noisy_dataset();
    let mut bulk_bench = c.benchmark_group("Bulk arithmetic benchmarks");
    for op in [Arithmetic::Add, Arithmetic::Div] {
        bulk_bench.bench_function(format!("{:?} between 1M-voxel elements", op), |bench| {
            bench.iter(|| dataset.combine(op, ElementId(0), ElementId(1)).unwrap())
        });
    }
    bulk_bench.bench_function("Min/max scan of a 1M-voxel element", |bench| {
        bench.iter(|| dataset.update_min_max(black_box(ElementId(1))).unwrap())
    });
    bulk_bench.finish();
}

criterion_group!(benches, criterion_benchmark_histograms);
criterion_main!(benches);
