//! Wires the three signal sources to the pure fusion function and to
//! storage: this is the single call path every signal callback funnels
//! through, taking the per-node lock before reading signals, fusing, and
//! persisting so a node's transitions are totally ordered.

use crate::app_state::AppState;
use crate::health_monitor::{self, NodeState};
use crate::repo;
use chrono::Utc;
use common_events::DomainEventKind;
use serde_json::json;
use uuid::Uuid;

fn parse_node_state(s: &str) -> NodeState {
    match s {
        "initializing" => NodeState::Initializing,
        "active" => NodeState::Active,
        "suspect" => NodeState::Suspect,
        "degraded" => NodeState::Degraded,
        "draining" => NodeState::Draining,
        "dead" => NodeState::Dead,
        _ => NodeState::Terminated,
    }
}

pub async fn evaluate_node(state: &AppState, node_id: Uuid) -> Result<(), sqlx::Error> {
    let lock = state.node_locks.lock_for(node_id).await;
    let _guard = lock.lock().await;

    let Some(node) = repo::get_node(&state.pool, node_id).await? else { return Ok(()) };
    let current = parse_node_state(&node.state);
    let signals = state.signals.snapshot(node_id).await;
    let fused = health_monitor::evaluate(
        signals,
        Utc::now(),
        state.config.heartbeat_timeout_secs,
        state.config.poll_interval_secs as i64,
        state.config.cloud_interval_secs as i64,
    );
    let new_state = health_monitor::apply_transition(current, fused);

    if new_state != current {
        repo::set_node_state(&state.pool, node_id, new_state.as_str()).await?;
        let _ = state
            .events
            .emit(node.tenant_id, DomainEventKind::NodeHealthChanged, None, json!({ "node_id": node_id, "new_state": new_state.as_str() }))
            .await;
        tracing::info!(%node_id, from = current.as_str(), to = new_state.as_str(), "node health transition");
    }

    Ok(())
}
