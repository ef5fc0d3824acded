//! C5 Triple-Safety Health Monitor: three independent signal sources fused
//! by a pure truth table into a Node's authoritative state.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A node's lifecycle state as stored in `nodes.state`. Only the fusion
/// pass (via `apply_transition`) writes this field once a node leaves
/// `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initializing,
    Active,
    Suspect,
    Degraded,
    Draining,
    Dead,
    Terminated,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Initializing => "initializing",
            NodeState::Active => "active",
            NodeState::Suspect => "suspect",
            NodeState::Degraded => "degraded",
            NodeState::Draining => "draining",
            NodeState::Dead => "dead",
            NodeState::Terminated => "terminated",
        }
    }
}

/// What the fusion function itself can produce. `Active` here means the
/// table's "Healthy" row; it is renamed to line up with `NodeState::Active`
/// since the node entity has no separate "Healthy" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedHealth {
    Healthy,
    Degraded,
    Suspect,
    Dead,
}

/// A single observation from one of the three signal sources.
#[derive(Debug, Clone, Copy)]
pub struct SignalSample {
    pub at: DateTime<Utc>,
    pub healthy: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSignals {
    pub heartbeat: Option<SignalSample>,
    pub poll: Option<SignalSample>,
    pub cloud: Option<SignalSample>,
}

fn fresh_and_ok(sample: Option<SignalSample>, now: DateTime<Utc>, window: ChronoDuration) -> bool {
    match sample {
        Some(s) if s.healthy => now.signed_duration_since(s.at) <= window,
        _ => false,
    }
}

/// The heartbeat/poll/cloud truth table, expressed as an ordered set of
/// rules. Every one of the 8 boolean combinations is covered; rules are
/// evaluated in the order listed here, first match wins.
pub fn fuse(hb_ok: bool, poll_ok: bool, cloud_ok: bool) -> FusedHealth {
    match (hb_ok, poll_ok, cloud_ok) {
        (true, true, true) => FusedHealth::Healthy,
        (false, false, false) => FusedHealth::Dead,
        (true, false, _) => FusedHealth::Degraded,
        (false, true, _) => FusedHealth::Degraded,
        _ => FusedHealth::Suspect,
    }
}

/// Evaluates freshness against each signal's window and fuses.
pub fn evaluate(signals: NodeSignals, now: DateTime<Utc>, heartbeat_timeout_secs: i64, poll_interval_secs: i64, cloud_interval_secs: i64) -> FusedHealth {
    let hb_ok = fresh_and_ok(signals.heartbeat, now, ChronoDuration::seconds(heartbeat_timeout_secs));
    let poll_ok = fresh_and_ok(signals.poll, now, ChronoDuration::seconds(2 * poll_interval_secs));
    let cloud_ok = fresh_and_ok(signals.cloud, now, ChronoDuration::seconds(2 * cloud_interval_secs));
    fuse(hb_ok, poll_ok, cloud_ok)
}

/// A terminal `Dead` state, or an operator-driven `Draining`/`Terminated`
/// state, never auto re-promotes from a fusion result; only an explicit
/// re-registration (handled outside this module) resets it.
pub fn apply_transition(current: NodeState, fused: FusedHealth) -> NodeState {
    match current {
        NodeState::Dead | NodeState::Draining | NodeState::Terminated => current,
        _ => match fused {
            FusedHealth::Healthy => NodeState::Active,
            FusedHealth::Degraded => NodeState::Degraded,
            FusedHealth::Suspect => NodeState::Suspect,
            FusedHealth::Dead => NodeState::Dead,
        },
    }
}

/// Per-node single-writer guard: the monitor's three signal callbacks all
/// funnel through `evaluate_node` below, which takes this node's lock before
/// reading signals, fusing, and writing the authoritative state, so a node's
/// transitions are totally ordered.
#[derive(Clone, Default)]
pub struct NodeLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, node_id: Uuid) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().await;
        table.entry(node_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// In-memory latest-sample holder for the three signal sources, per node.
/// Not a source of truth for the node's authoritative state (that's the DB
/// row `evaluate_node` writes) — only a staging area the three signal
/// callbacks feed before fusion runs.
#[derive(Clone, Default)]
pub struct SignalsStore {
    signals: Arc<tokio::sync::RwLock<HashMap<Uuid, NodeSignals>>>,
}

impl SignalsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_heartbeat(&self, node_id: Uuid, healthy: bool, at: DateTime<Utc>) {
        let mut table = self.signals.write().await;
        table.entry(node_id).or_default().heartbeat = Some(SignalSample { at, healthy });
    }

    pub async fn record_poll(&self, node_id: Uuid, healthy: bool, at: DateTime<Utc>) {
        let mut table = self.signals.write().await;
        table.entry(node_id).or_default().poll = Some(SignalSample { at, healthy });
    }

    pub async fn record_cloud(&self, node_id: Uuid, healthy: bool, at: DateTime<Utc>) {
        let mut table = self.signals.write().await;
        table.entry(node_id).or_default().cloud = Some(SignalSample { at, healthy });
    }

    pub async fn snapshot(&self, node_id: Uuid) -> NodeSignals {
        self.signals.read().await.get(&node_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_table_matches_spec_for_every_combination() {
        assert_eq!(fuse(true, true, true), FusedHealth::Healthy);
        assert_eq!(fuse(false, false, false), FusedHealth::Dead);
        assert_eq!(fuse(true, false, true), FusedHealth::Degraded);
        assert_eq!(fuse(true, false, false), FusedHealth::Degraded);
        assert_eq!(fuse(false, true, true), FusedHealth::Degraded);
        assert_eq!(fuse(false, true, false), FusedHealth::Degraded);
        assert_eq!(fuse(true, true, false), FusedHealth::Suspect);
        assert_eq!(fuse(false, false, true), FusedHealth::Suspect);
    }

    #[test]
    fn dead_node_never_auto_promotes() {
        assert_eq!(apply_transition(NodeState::Dead, FusedHealth::Healthy), NodeState::Dead);
    }

    #[test]
    fn draining_node_ignores_fusion_result() {
        assert_eq!(apply_transition(NodeState::Draining, FusedHealth::Healthy), NodeState::Draining);
    }

    #[test]
    fn active_node_can_demote_to_suspect() {
        assert_eq!(apply_transition(NodeState::Active, FusedHealth::Suspect), NodeState::Suspect);
    }

    #[test]
    fn signals_drop_one_at_a_time_from_healthy_down_to_dead() {
        let now = Utc::now();
        let fresh = NodeSignals {
            heartbeat: Some(SignalSample { at: now, healthy: true }),
            poll: Some(SignalSample { at: now, healthy: true }),
            cloud: Some(SignalSample { at: now, healthy: true }),
        };
        assert_eq!(evaluate(fresh, now, 30, 30, 60), FusedHealth::Healthy);

        let hb_dropped = NodeSignals { heartbeat: Some(SignalSample { at: now - ChronoDuration::seconds(40), healthy: true }), ..fresh };
        assert_eq!(evaluate(hb_dropped, now, 30, 30, 60), FusedHealth::Degraded);

        let poll_also_dropped = NodeSignals {
            poll: Some(SignalSample { at: now - ChronoDuration::seconds(70), healthy: true }),
            ..hb_dropped
        };
        assert_eq!(evaluate(poll_also_dropped, now, 30, 30, 60), FusedHealth::Suspect);

        let cloud_also_dropped = NodeSignals {
            cloud: Some(SignalSample { at: now - ChronoDuration::seconds(120), healthy: true }),
            ..poll_also_dropped
        };
        assert_eq!(evaluate(cloud_also_dropped, now, 30, 30, 60), FusedHealth::Dead);
    }
}
