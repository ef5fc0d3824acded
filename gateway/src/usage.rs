//! Per-request usage recording (C9, gateway side). Fire-and-forget: the
//! insert never blocks or fails the response path. A single bounded insert
//! runs per request rather than a batched window (the hourly roll-up and
//! billing export live in `billing-service::aggregator`).

use crate::repo;
use common_money::Money;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct UsageRecord {
    pub request_id: Uuid,
    pub tenant_id: Uuid,
    pub environment_id: Uuid,
    pub key_id: Uuid,
    pub node_id: Option<Uuid>,
    pub model_id: Uuid,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cached_tokens: i64,
    pub latency_ms: i64,
    pub cost: Money,
}

#[derive(Clone)]
pub struct UsageRecorder {
    pool: PgPool,
    flush_timeout: Duration,
}

impl UsageRecorder {
    pub fn new(pool: PgPool, flush_timeout: Duration) -> Self {
        Self { pool, flush_timeout }
    }

    /// Spawns the insert so the caller's response path never waits on it.
    pub fn record(&self, record: UsageRecord) {
        let pool = self.pool.clone();
        let timeout = self.flush_timeout;
        tokio::spawn(async move {
            let fut = repo::insert_usage_record(
                &pool,
                record.request_id,
                record.tenant_id,
                record.environment_id,
                record.key_id,
                record.node_id,
                record.model_id,
                record.prompt_tokens,
                record.completion_tokens,
                record.cached_tokens,
                record.latency_ms,
                record.cost,
            );
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(?err, request_id = %record.request_id, "usage record insert failed"),
                Err(_) => tracing::warn!(request_id = %record.request_id, "usage record insert timed out"),
            }
        });
    }
}

/// `Model.price_in_micros`/`price_out_micros` are per-million-token prices;
/// cost is truncated (floor) to whole micro-units.
pub fn compute_cost_micros(prompt_tokens: i64, completion_tokens: i64, price_in_micros: i64, price_out_micros: i64, region_multiplier: f64) -> Money {
    let raw = (prompt_tokens as f64 * price_in_micros as f64 + completion_tokens as f64 * price_out_micros as f64) / 1_000_000.0;
    let scaled = (raw * region_multiplier).floor();
    Money::from_micros(scaled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_truncates_down_to_whole_micros() {
        // (1_000_000 prompt tokens * 15 micros/million) / 1e6 = 15 micros exactly.
        let cost = compute_cost_micros(1_000_000, 0, 15, 0, 1.0);
        assert_eq!(cost.as_micros(), 15);
    }

    #[test]
    fn region_multiplier_scales_cost() {
        let base = compute_cost_micros(1_000_000, 0, 10, 0, 1.0);
        let doubled = compute_cost_micros(1_000_000, 0, 10, 0, 2.0);
        assert_eq!(doubled.as_micros(), base.as_micros() * 2);
    }
}
