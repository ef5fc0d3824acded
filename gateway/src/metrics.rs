use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    admission_total: IntCounterVec,
    rate_limit_rejections: IntCounterVec,
    proxy_latency_seconds: Histogram,
    proxy_errors_total: IntCounterVec,
    endpoints_tracked: IntGauge,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let admission_total =
            IntCounterVec::new(Opts::new("gateway_admission_total", "Total admission pipeline outcomes"), &["outcome"])?;
        let rate_limit_rejections = IntCounterVec::new(
            Opts::new("gateway_rate_limit_rejections_total", "Total rate limit rejections by scope"),
            &["scope"],
        )?;
        let proxy_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("gateway_proxy_latency_seconds", "Latency of proxied inference requests")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let proxy_errors_total =
            IntCounterVec::new(Opts::new("gateway_proxy_errors_total", "Proxy errors by endpoint"), &["endpoint"])?;
        let endpoints_tracked = IntGauge::with_opts(Opts::new("gateway_endpoints_tracked", "Number of endpoints with live stats"))?;

        registry.register(Box::new(admission_total.clone()))?;
        registry.register(Box::new(rate_limit_rejections.clone()))?;
        registry.register(Box::new(proxy_latency_seconds.clone()))?;
        registry.register(Box::new(proxy_errors_total.clone()))?;
        registry.register(Box::new(endpoints_tracked.clone()))?;

        Ok(Self { registry, admission_total, rate_limit_rejections, proxy_latency_seconds, proxy_errors_total, endpoints_tracked })
    }

    pub fn record_admission(&self, outcome: &str) {
        self.admission_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_rate_limit_rejection(&self, scope: &str) {
        self.rate_limit_rejections.with_label_values(&[scope]).inc();
    }

    pub fn observe_proxy_latency(&self, secs: f64) {
        self.proxy_latency_seconds.observe(secs);
    }

    pub fn record_proxy_error(&self, endpoint: &str) {
        self.proxy_errors_total.with_label_values(&[endpoint]).inc();
    }

    pub fn set_endpoints_tracked(&self, count: i64) {
        self.endpoints_tracked.set(count);
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"))
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
