// In: benches/rans_bench.rs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};

use cctf_core::config::AnsVersion;
use cctf_core::kernels::rans;

const NUM_VALUES: usize = 65_536;

/// Heavily skewed small-alphabet data, the typical shape of charge and flag
/// columns.
fn low_entropy_data() -> Vec<u32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    (0..NUM_VALUES)
        .map(|_| {
            let r: f64 = rng.random();
            (r * r * 16.0) as u32
        })
        .collect()
}

/// Near-uniform wide-alphabet data, the worst case for the frequency table.
fn high_entropy_data() -> Vec<u32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    (0..NUM_VALUES).map(|_| rng.random_range(0..3000)).collect()
}

fn bench_rans(c: &mut Criterion) {
    let datasets = [
        ("low_entropy", low_entropy_data()),
        ("high_entropy", high_entropy_data()),
    ];

    let mut group = c.benchmark_group("rans");
    group.throughput(Throughput::Bytes((NUM_VALUES * 4) as u64));

    for (name, data) in &datasets {
        for version in [AnsVersion::Compat, AnsVersion::V1] {
            let tag = version.tag();
            group.bench_with_input(
                BenchmarkId::new(format!("encode_v{tag}"), name),
                data,
                |b, data| b.iter(|| rans::encode_stream(black_box(data), version).unwrap()),
            );

            let encoded = rans::encode_stream(data, version).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("decode_v{tag}"), name),
                &encoded,
                |b, encoded| {
                    b.iter(|| {
                        rans::decode_stream(black_box(encoded), NUM_VALUES, version).unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_rans);
criterion_main!(benches);
