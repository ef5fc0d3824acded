//! In-memory per-endpoint statistics and model-aware endpoint selection.
//!
//! `EndpointStats` lives only in this process: readers (`select`) take the
//! read half of a single `RwLock`, writers (`record`, the queue-depth
//! poller, and the staleness sweep) take the write half. Critical sections
//! are O(fleet size).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

const EXPLORATION_SCORE: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct EndpointStats {
    pub ewma_latency_ms: f64,
    pub request_count: u64,
    pub error_count: u64,
    pub queue_depth: u32,
    pub active_requests: u32,
    pub last_updated: DateTime<Utc>,
}

impl EndpointStats {
    fn score(&self) -> f64 {
        let latency_score = 1.0 / (self.ewma_latency_ms + 1.0);
        let queue_score = 1.0 / (self.queue_depth as f64 + 1.0);
        let error_score = 1.0 / (self.error_count as f64 + 1.0);
        0.40 * latency_score + 0.30 * queue_score + 0.30 * error_score
    }
}

/// A candidate backing a requested model: its endpoint URL, where the
/// node's authoritative state is `active` (callers only pass endpoints
/// that already satisfy that filter).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub endpoint: String,
}

pub struct LoadBalancer {
    stats: RwLock<HashMap<String, EndpointStats>>,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self { stats: RwLock::new(HashMap::new()) }
    }

    /// `Select(modelName)`: scores every candidate endpoint and returns the
    /// argmax. Endpoints with no stats yet receive an exploration boost
    /// strictly greater than any stat-based score.
    pub async fn select(&self, candidates: &[Candidate]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let stats = self.stats.read().await;
        let mut best: Option<(&str, f64)> = None;
        for candidate in candidates {
            let score = match stats.get(&candidate.endpoint) {
                Some(s) => s.score(),
                None => EXPLORATION_SCORE,
            };
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((candidate.endpoint.as_str(), score)),
            }
        }
        best.map(|(endpoint, _)| endpoint.to_string())
    }

    /// `Record(endpoint, latency, isError)`: EWMA update with the first
    /// sample seeding the average.
    pub async fn record(&self, endpoint: &str, latency_ms: f64, is_error: bool) {
        let mut stats = self.stats.write().await;
        let now = Utc::now();
        let entry = stats.entry(endpoint.to_string()).or_insert_with(|| EndpointStats {
            ewma_latency_ms: latency_ms,
            request_count: 0,
            error_count: 0,
            queue_depth: 0,
            active_requests: 0,
            last_updated: now,
        });
        entry.ewma_latency_ms = if entry.request_count == 0 { latency_ms } else { 0.8 * entry.ewma_latency_ms + 0.2 * latency_ms };
        entry.request_count += 1;
        if is_error {
            entry.error_count += 1;
        }
        entry.last_updated = now;
    }

    pub async fn update_queue_depth(&self, endpoint: &str, queue_depth: u32, active_requests: u32) {
        let mut stats = self.stats.write().await;
        let now = Utc::now();
        let entry = stats.entry(endpoint.to_string()).or_insert_with(|| EndpointStats {
            ewma_latency_ms: 0.0,
            request_count: 0,
            error_count: 0,
            queue_depth,
            active_requests,
            last_updated: now,
        });
        entry.queue_depth = queue_depth;
        entry.active_requests = active_requests;
        entry.last_updated = now;
    }

    /// Removes stats entries that are both stale and no longer backed
    /// by any endpoint in `live_endpoints`. Never removes a live endpoint
    /// just because it is stale — a stale-but-live endpoint is still a
    /// candidate, merely a signal that its poller is failing.
    pub async fn sweep_stale(&self, staleness_secs: i64, live_endpoints: &std::collections::HashSet<String>) {
        let mut stats = self.stats.write().await;
        let now = Utc::now();
        stats.retain(|endpoint, s| {
            let stale = now.signed_duration_since(s.last_updated).num_seconds() > staleness_secs;
            !(stale && !live_endpoints.contains(endpoint))
        });
    }

    #[cfg(test)]
    pub async fn snapshot(&self, endpoint: &str) -> Option<EndpointStats> {
        self.stats.read().await.get(endpoint).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prefers_lower_latency_and_error_endpoint() {
        let lb = LoadBalancer::new();
        lb.record("https://a", 10.0, false).await;
        lb.record("https://b", 100.0, false).await;
        for _ in 0..5 {
            lb.record("https://b", 100.0, true).await;
        }

        let candidates = vec![Candidate { endpoint: "https://a".into() }, Candidate { endpoint: "https://b".into() }];
        let mut a_wins = 0;
        for _ in 0..100 {
            if lb.select(&candidates).await.as_deref() == Some("https://a") {
                a_wins += 1;
            }
        }
        assert_eq!(a_wins, 100);
    }

    #[tokio::test]
    async fn unknown_endpoint_gets_exploration_boost_over_scored_one() {
        let lb = LoadBalancer::new();
        lb.record("https://known", 5.0, false).await;

        let candidates = vec![Candidate { endpoint: "https://known".into() }, Candidate { endpoint: "https://new".into() }];
        let selected = lb.select(&candidates).await;
        assert_eq!(selected.as_deref(), Some("https://new"));
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_and_dead_endpoints() {
        let lb = LoadBalancer::new();
        lb.record("https://gone", 5.0, false).await;
        lb.record("https://still-live", 5.0, false).await;

        let mut live = std::collections::HashSet::new();
        live.insert("https://still-live".to_string());

        lb.sweep_stale(-1, &live).await;

        assert!(lb.snapshot("https://gone").await.is_none());
        assert!(lb.snapshot("https://still-live").await.is_some());
    }
}
