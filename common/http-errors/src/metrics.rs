use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, Opts};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Above this many distinct error codes seen in the process lifetime, further
/// codes collapse into the `other` label so a misbehaving caller can't blow up
/// Prometheus label cardinality.
const MAX_ERROR_CODES: usize = 40;

static ERROR_CODE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_error_responses_total", "HTTP error responses by code"),
        &["service", "code"],
    )
    .expect("metric registration")
});

static DISTINCT_CODES_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("http_error_distinct_codes", "Distinct error codes observed, capped").expect("metric registration")
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));
static OVERFLOW_COUNT: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_error_code(code: &str) {
    let mut seen = SEEN_CODES.lock().expect("error-code set poisoned");
    if seen.contains(code) {
        return;
    }
    if seen.len() >= MAX_ERROR_CODES {
        OVERFLOW_COUNT.fetch_add(1, Ordering::Relaxed);
        return;
    }
    seen.insert(code.to_string());
    DISTINCT_CODES_GAUGE.set(seen.len() as i64);
}

fn label_for(code: &str) -> String {
    let seen = SEEN_CODES.lock().expect("error-code set poisoned");
    if seen.contains(code) {
        code.to_string()
    } else {
        "other".to_string()
    }
}

/// Axum middleware that counts `ApiError` responses by code, with a label
/// cardinality guard. Register the returned closure via `middleware::from_fn`.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>> + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let response = next.run(req).await;
            if response.status().is_client_error() || response.status().is_server_error() {
                let code = response
                    .headers()
                    .get("X-Error-Code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string();
                record_error_code(&code);
                let label = label_for(&code);
                ERROR_CODE_COUNTER.with_label_values(&[service, &label]).inc();
            }
            response
        })
    }
}

pub(crate) fn distinct_gauge_value() -> i64 {
    DISTINCT_CODES_GAUGE.get()
}

pub(crate) fn overflow_count_value() -> u64 {
    OVERFLOW_COUNT.load(Ordering::Relaxed)
}
