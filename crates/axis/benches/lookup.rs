use axis::Axis;
use contracts::{AxisConfig, CueArg, Interval, RelationMask};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn populated(n: usize) -> Axis {
    let mut axis = Axis::new(&AxisConfig::default()).unwrap();
    let args = (0..n)
        .map(|i| {
            let low = (i * 7 % 10_000) as f64;
            let length = [1.0, 25.0, 400.0][i % 3];
            CueArg::interval(i as u64, Interval::new(low, low + length).unwrap())
        })
        .collect();
    axis.update(args).unwrap();
    axis
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("axis_lookup");
    for n in [1_000, 10_000, 100_000] {
        let axis = populated(n);
        group.bench_with_input(BenchmarkId::new("point", n), &axis, |b, axis| {
            b.iter(|| axis.lookup(black_box(&Interval::singular(5_000.0)), RelationMask::OVERLAP))
        });
        group.bench_with_input(BenchmarkId::new("window", n), &axis, |b, axis| {
            let q = Interval::closed(4_000.0, 4_050.0).unwrap();
            b.iter(|| axis.get_cue_points_by_interval(black_box(&q)))
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    c.bench_function("axis_update_1000", |b| {
        b.iter_batched(
            || populated(10_000),
            |mut axis| {
                let args = (0..1_000u64)
                    .map(|i| {
                        let low = (i * 13) as f64;
                        CueArg::interval(i, Interval::new(low, low + 5.0).unwrap())
                    })
                    .collect();
                axis.update(args).unwrap()
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_lookup, bench_update);
criterion_main!(benches);
