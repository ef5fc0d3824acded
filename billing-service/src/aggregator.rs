//! C9 hourly roll-up and 5-minute billing-export background jobs. Both are
//! plain `tokio::spawn`ed interval loops; neither ever fails the request
//! path, only logs and retries next tick.

use crate::app_state::AppState;
use crate::repo;
use chrono::{Timelike, Utc};
use common_events::DomainEventKind;
use common_money::Money;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

pub fn spawn_hourly_rollup(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.hourly_rollup_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = run_hourly_rollup(&state).await {
                warn!(?err, "hourly usage rollup failed");
            }
        }
    });
}

async fn run_hourly_rollup(state: &AppState) -> Result<(), sqlx::Error> {
    let rows = repo::rollup_previous_hour(&state.pool).await?;
    let hour = Utc::now() - chrono::Duration::hours(1);
    let closed_hour = hour.date_naive().and_hms_opt(hour.time().hour(), 0, 0).map(|naive| chrono::DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)).unwrap_or(hour);

    let mut count = 0;
    for row in &rows {
        repo::upsert_usage_hourly(&state.pool, closed_hour, row).await?;
        count += 1;
    }

    let _ = state.events.emit(None, DomainEventKind::BillingRollupCompleted, None, json!({ "hour": closed_hour, "groups": count })).await;
    info!(groups = count, hour = %closed_hour, "hourly usage rollup completed");
    Ok(())
}

pub fn spawn_billing_export(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.billing_export_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = run_billing_export(&state).await {
                warn!(?err, "billing export job failed");
            }
        }
    });
}

async fn run_billing_export(state: &AppState) -> Result<(), sqlx::Error> {
    let totals = repo::unbilled_totals_last_hour(&state.pool).await?;
    let Some(base_url) = state.config.billing_export_base_url.as_deref() else {
        return Ok(());
    };
    let client = reqwest::Client::new();

    for total in totals {
        let Some(customer_id) = total.billing_customer_id.as_deref() else { continue };
        let amount = Money::from_micros(total.total_cost_micros);
        let result = client
            .post(format!("{base_url}/usage_records"))
            .bearer_auth(state.config.billing_export_api_token.as_deref().unwrap_or(""))
            .json(&json!({ "customer": customer_id, "quantity": amount.as_cents() }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                repo::mark_usage_records_billed_for_tenant(&state.pool, total.tenant_id).await?;
                repo::insert_billing_event(&state.pool, total.tenant_id, "usage_exported", amount, Some(customer_id)).await?;
            }
            Ok(resp) => {
                warn!(status = %resp.status(), tenant_id = %total.tenant_id, "billing export rejected");
                repo::mark_usage_billing_failed(&state.pool, total.tenant_id).await?;
            }
            Err(err) => {
                warn!(?err, tenant_id = %total.tenant_id, "billing export request failed");
                repo::mark_usage_billing_failed(&state.pool, total.tenant_id).await?;
            }
        }
    }
    Ok(())
}
