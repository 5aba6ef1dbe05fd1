//! Kernel benchmarks: delay estimation and residual-cube evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use seisloc_core::{
    DelayParams, LocateParams, Precision, SearchGrid, SignalBlock, Station, SurfaceArray,
    VelocityModel,
};
use seisloc_engine::{ComputeBackend, CpuBackend, LocateJob};

fn shifted_block(stations: usize, samples: usize) -> SignalBlock {
    let mut block = SignalBlock::zeroed(stations, samples).unwrap();
    for s in 0..stations {
        let channel = block.channel_mut(s);
        for (i, value) in channel.iter_mut().enumerate() {
            let t = i as f32 - s as f32;
            *value = t + t.sin();
        }
    }
    block
}

fn bench_delay_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("delays");
    let backend = CpuBackend::new();

    for samples in [1024usize, 4096] {
        let block = shifted_block(8, samples);
        let params = DelayParams {
            window_size: 16,
            scanner_size: 8,
            min_correlation: 0.8,
            base_station: 0,
            precision: Precision::Single,
        };
        group.throughput(Throughput::Elements(params.processed_rows(samples) as u64));
        group.bench_with_input(
            BenchmarkId::new("estimate", samples),
            &block,
            |b, block| {
                b.iter(|| {
                    let matrix = backend.estimate_delays(black_box(block), &params).unwrap();
                    black_box(matrix);
                });
            },
        );
    }
    group.finish();
}

fn bench_residual_cube(c: &mut Criterion) {
    let mut group = c.benchmark_group("cube");
    let backend = CpuBackend::new();

    let model =
        VelocityModel::from_rows(&[[0.0, 1000.0, 2000.0], [-1000.0, 0.0, 3000.0]]).unwrap();
    let array = SurfaceArray::new(
        vec![
            Station { x: 0.0, y: 0.0 },
            Station { x: 500.0, y: 0.0 },
            Station { x: 0.0, y: 500.0 },
            Station { x: -500.0, y: 0.0 },
            Station { x: 0.0, y: -500.0 },
        ],
        999.0,
    )
    .unwrap();

    for n in [8usize, 16] {
        let params = LocateParams {
            accuracy: 2.0,
            frequency: 1000,
            base_station: 0,
            grid: SearchGrid {
                dx: 25.0,
                dy: 25.0,
                dz: 25.0,
                nx: n,
                ny: n,
                nz: n,
            },
        };
        let delays = vec![1, 0, 40, 40, 40, 40];
        let origins = vec![[-100.0, -100.0, -600.0]];
        group.throughput(Throughput::Elements(params.grid.node_count() as u64));
        group.bench_with_input(BenchmarkId::new("evaluate", n), &params, |b, params| {
            let job = LocateJob {
                model: &model,
                array: &array,
                delays: &delays,
                origins: &origins,
                params,
            };
            b.iter(|| {
                let cube = backend.evaluate_cube(black_box(&job)).unwrap();
                black_box(cube);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_delay_estimator, bench_residual_cube);
criterion_main!(benches);
