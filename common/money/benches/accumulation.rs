use common_money::{aggregate_sum, Money};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn generate_values(n: usize) -> Vec<Money> {
    let patterns = [1_005_i64, 2_675, 9_000, 3_333_333, 4_444_444, 5_555_555, 5_000, 9_999_999, 12_341_000, 7_500_000];
    (0..n).map(|i| Money::from_micros(patterns[i % patterns.len()])).collect()
}

fn bench_accumulation(c: &mut Criterion) {
    let sizes = [100usize, 1_000, 10_000];
    for &n in &sizes {
        let data = generate_values(n);
        c.bench_function(&format!("accumulate_sum_iter_{n}"), |b| {
            b.iter(|| {
                let total: Money = data.iter().copied().sum();
                black_box(total);
            })
        });
        c.bench_function(&format!("accumulate_aggregate_sum_{n}"), |b| {
            b.iter(|| {
                let total = aggregate_sum(&data);
                black_box(total);
            })
        });
    }
}

criterion_group!(benches, bench_accumulation);
criterion_main!(benches);
