use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rimseval::dataset::{ArrivalDataset, CrdHeader};
use rimseval::processor::CrdFileProcessor;
use rimseval::spectrum::bin_dataset_shots;

/// Create a measurement with a few heavy peaks and some noisy shots
fn create_dataset(num_shots: usize) -> ArrivalDataset {
    let mut ions = Vec::with_capacity(num_shots);
    let mut arrivals = Vec::new();
    let mut state = 0x2545_f491_u32;

    for shot in 0..num_shots {
        let n = if shot % 97 == 0 { 12 } else { (shot % 4) as u32 };
        for _ in 0..n {
            // xorshift keeps the data deterministic across runs
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let peak = [2_000, 4_500, 4_520, 9_000][(state % 4) as usize];
            arrivals.push(peak + state % 40);
        }
        ions.push(n);
    }

    let header = CrdHeader::new(100, 2_000, 9_039, 0.0, num_shots);
    ArrivalDataset::new("bench", header, ions, arrivals).unwrap()
}

fn bench_binning(c: &mut Criterion) {
    let mut group = c.benchmark_group("binning");

    for num_shots in [10_000, 100_000] {
        let dataset = create_dataset(num_shots);
        let shots: Vec<usize> = (0..num_shots).collect();
        group.throughput(Throughput::Elements(dataset.all_arrivals().len() as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}shots", num_shots)),
            &dataset,
            |b, dataset| b.iter(|| bin_dataset_shots(black_box(dataset), black_box(&shots)).unwrap()),
        );
    }

    group.finish();
}

fn bench_packages(c: &mut Criterion) {
    let mut group = c.benchmark_group("packages");
    let dataset = create_dataset(100_000);

    for shots_per_package in [100, 1_000] {
        let mut crd = CrdFileProcessor::new(dataset.clone());
        crd.spectrum_full().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(shots_per_package),
            &shots_per_package,
            |b, &spp| {
                b.iter(|| {
                    crd.spectrum_full().unwrap();
                    crd.packages(spp).unwrap();
                    crd.filter_max_ions_per_pkg(black_box(1_500)).unwrap();
                })
            },
        );
    }

    group.finish();
}

fn bench_shot_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("shot_filters");
    let dataset = create_dataset(100_000);
    let mut crd = CrdFileProcessor::new(dataset);

    group.bench_function("max_ions_per_shot", |b| {
        b.iter(|| {
            crd.spectrum_full().unwrap();
            crd.filter_max_ions_per_shot(black_box(5)).unwrap();
        })
    });

    group.bench_function("max_ions_per_time", |b| {
        b.iter(|| {
            crd.spectrum_full().unwrap();
            crd.filter_max_ions_per_time(black_box(3), black_box(0.05)).unwrap();
        })
    });

    group.bench_function("max_ions_per_tof_window", |b| {
        b.iter(|| {
            crd.spectrum_full().unwrap();
            crd.filter_max_ions_per_tof_window(black_box(3), black_box([0.44, 0.46])).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_binning, bench_packages, bench_shot_filters);
criterion_main!(benches);
