//! Shared tracing/metrics bootstrap used identically by the gateway,
//! fleet-controller, and billing-service binaries, plus a log-message
//! redaction helper for the one place each service logs a raw upstream or
//! webhook payload that may carry a secret.

pub mod redact;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// Initializes the process-wide `tracing` subscriber. Every binary calls
/// this once at startup.
pub fn init_tracing(service_name: &str) {
    tracing_subscriber::fmt().with_env_filter("info").init();
    tracing::info!(service = service_name, "tracing initialized");
}

/// A registry plus the one metric every control-plane service exposes: a
/// count of HTTP error responses by code, matching what
/// `common_http_errors::ApiError::into_response` records per service.
/// Binaries register their own additional metrics into the same registry.
#[derive(Clone)]
pub struct BaseMetrics {
    pub registry: Registry,
    pub http_errors_total: IntCounterVec,
    pub request_duration_seconds: Histogram,
}

impl BaseMetrics {
    pub fn new(service_name: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_errors_total = IntCounterVec::new(
            Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)").const_label("service", service_name),
            &["code"],
        )?;
        let request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("http_request_duration_seconds", "End-to-end handler latency")
                .const_label("service", service_name)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self { registry, http_errors_total, request_duration_seconds })
    }

    pub fn record_error_code(&self, code: &str) {
        self.http_errors_total.with_label_values(&[code]).inc();
    }

    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_metrics_registers_without_panicking() {
        let metrics = BaseMetrics::new("test-service").expect("metrics construction");
        metrics.record_error_code("rate_limited");
        let rendered = metrics.render().expect("render");
        assert!(String::from_utf8_lossy(&rendered).contains("http_errors_total"));
    }
}
