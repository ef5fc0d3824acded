use common_money::{init_rounding_mode_from_env, parse_decimal_to_micros};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_parse_half_up(c: &mut Criterion) {
    std::env::remove_var("MONEY_ROUNDING");
    init_rounding_mode_from_env();
    let samples = [
        "1.005", "2.675", "0.005", "-1.005", "-2.505", "12345", "19.90", "1000000.555", "-999999.995", "0.3349", "42.4242",
    ];
    c.bench_function("parse_decimal_to_micros_half_up", |b| {
        b.iter(|| {
            for v in &samples {
                black_box(parse_decimal_to_micros(v).unwrap());
            }
        });
    });
}

criterion_group!(rounding, bench_parse_half_up);
criterion_main!(rounding);
