//! White-box hooks for exercising the error-code cardinality guard without
//! spinning up a full axum app. Gated behind the `test-helpers` feature.

use crate::metrics;

pub fn simulate_error_code(code: &str) {
    metrics::record_error_code(code);
}

pub fn distinct_gauge() -> i64 {
    metrics::distinct_gauge_value()
}

pub fn overflow_count() -> u64 {
    metrics::overflow_count_value()
}
