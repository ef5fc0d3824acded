use common_money::{parse_decimal_to_micros, Money};
use proptest::prelude::*;

proptest! {
    /// Parsing cents-only decimals (no sub-micro remainder) must round-trip
    /// exactly regardless of the configured rounding mode, since there is
    /// no guard digit to round away.
    #[test]
    fn cents_only_decimals_round_trip_exactly(cents in -100_000i64..100_000) {
        let s = format!("{}.{:02}", cents / 100, (cents % 100).abs());
        let parsed = parse_decimal_to_micros(&s).unwrap();
        prop_assert_eq!(parsed, Money::from_cents(cents));
    }

    /// Summing N identical per-unit costs by micros must equal multiplying
    /// by N; guards against accumulation drift across a billing window.
    #[test]
    fn repeated_sum_matches_multiplication(unit_micros in 0i64..1_000_000, count in 0u32..500) {
        let values: Vec<Money> = (0..count).map(|_| Money::from_micros(unit_micros)).collect();
        let total: Money = values.into_iter().sum();
        prop_assert_eq!(total.as_micros(), unit_micros.saturating_mul(count as i64));
    }
}
