//! Per-event-type dispatch under one DB transaction per event, plus the
//! reservation lifecycle around it.

use crate::app_state::AppState;
use crate::webhook::verify_signature;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use common_events::DomainEventKind;
use serde_json::{json, Value};
use sqlx::{Postgres, Transaction};
use tracing::warn;

const PROCESSING: &str = "processing";
const PROCESSED: &str = "processed";

fn subscription_status_to_tenant_status(vendor_status: &str) -> &'static str {
    match vendor_status {
        "active" | "trialing" => "active",
        "past_due" | "unpaid" | "incomplete" => "suspended",
        "canceled" | "incomplete_expired" => "canceled",
        _ => "suspended",
    }
}

fn reservation_key(prefix: &str, external_event_id: &str) -> String {
    format!("{prefix}:webhook:{external_event_id}")
}

/// `POST /api/webhooks/stripe`. No bearer auth; authenticity comes entirely
/// from the `Stripe-Signature` header.
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature_header = headers.get("Stripe-Signature").and_then(|v| v.to_str().ok());
    if let Err(err) = verify_signature(&state.config.stripe_webhook_secret, &body, signature_header, state.config.webhook_max_skew_secs, Utc::now()) {
        warn!(?err, "webhook signature verification failed");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let event: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let external_event_id = match event.get("id").and_then(|v| v.as_str()) {
        Some(id) => id.to_string(),
        None => return StatusCode::BAD_REQUEST.into_response(),
    };
    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();

    let key = reservation_key(&state.config.redis_prefix, &external_event_id);
    let reserved = match state.webhook_kv.try_reserve(&key, PROCESSING, state.config.webhook_processing_ttl_secs).await {
        Ok(reserved) => reserved,
        Err(err) => {
            warn!(?err, "webhook reservation store unavailable");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };
    if !reserved {
        // Already `processed` or owned by another worker: idempotent skip.
        return StatusCode::OK.into_response();
    }

    match dispatch(&state, &event_type, &event).await {
        Ok(()) => {
            let _ = state.webhook_kv.set(&key, PROCESSED, state.config.webhook_processed_ttl_secs).await;
            if let Err(err) = crate::repo::insert_webhook_event(&state.pool, &external_event_id, &event_type, &event).await {
                warn!(?err, external_event_id, "failed to write webhook audit row");
            }
            let _ = state.events.emit(None, DomainEventKind::WebhookReceived, None, json!({ "external_event_id": external_event_id, "event_type": event_type })).await;
            StatusCode::OK.into_response()
        }
        Err(err) => {
            warn!(?err, external_event_id, event_type, "webhook handler failed, releasing reservation for retry");
            let _ = state.webhook_kv.delete(&key).await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Runs the event's handler inside its own transaction and commits only if
/// every write in it succeeds, so a crash mid-handler never leaves (e.g.)
/// usage marked billed with no matching `BillingEvent` row.
async fn dispatch(state: &AppState, event_type: &str, event: &Value) -> Result<(), sqlx::Error> {
    let mut tx = state.pool.begin().await?;
    let result = match event_type {
        "payment_succeeded" => handle_payment_succeeded(&mut tx, event).await,
        "payment_failed" => handle_payment_failed(&mut tx, event).await,
        "subscription_updated" => handle_subscription_updated(&mut tx, event).await,
        "invoice_payment_succeeded" => handle_invoice_payment_succeeded(&mut tx, event).await,
        _ => Ok(()),
    };
    match result {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn customer_id(event: &Value) -> Option<&str> {
    event.pointer("/data/object/customer").and_then(|v| v.as_str())
}

async fn handle_payment_succeeded(tx: &mut Transaction<'_, Postgres>, event: &Value) -> Result<(), sqlx::Error> {
    let Some(customer) = customer_id(event) else { return Ok(()) };
    let Some(tenant_id) = crate::repo::find_tenant_by_billing_customer_id(&mut *tx, customer).await? else { return Ok(()) };
    crate::repo::set_tenant_status(&mut *tx, tenant_id, "active").await
}

async fn handle_payment_failed(tx: &mut Transaction<'_, Postgres>, event: &Value) -> Result<(), sqlx::Error> {
    let Some(customer) = customer_id(event) else { return Ok(()) };
    let Some(tenant_id) = crate::repo::find_tenant_by_billing_customer_id(&mut *tx, customer).await? else { return Ok(()) };
    crate::repo::set_tenant_status(&mut *tx, tenant_id, "suspended").await
}

async fn handle_subscription_updated(tx: &mut Transaction<'_, Postgres>, event: &Value) -> Result<(), sqlx::Error> {
    let Some(customer) = customer_id(event) else { return Ok(()) };
    let Some(tenant_id) = crate::repo::find_tenant_by_billing_customer_id(&mut *tx, customer).await? else { return Ok(()) };
    let vendor_status = event.pointer("/data/object/status").and_then(|v| v.as_str()).unwrap_or("");
    let billing_plan = event.pointer("/data/object/plan/nickname").and_then(|v| v.as_str()).unwrap_or("unknown");
    let tenant_status = subscription_status_to_tenant_status(vendor_status);
    crate::repo::set_tenant_status_and_plan(&mut *tx, tenant_id, tenant_status, billing_plan).await
}

async fn handle_invoice_payment_succeeded(tx: &mut Transaction<'_, Postgres>, event: &Value) -> Result<(), sqlx::Error> {
    let Some(customer) = customer_id(event) else { return Ok(()) };
    let Some(tenant_id) = crate::repo::find_tenant_by_billing_customer_id(&mut *tx, customer).await? else { return Ok(()) };
    let affected = crate::repo::mark_usage_records_billed_for_tenant(&mut *tx, tenant_id).await?;
    if affected > 0 {
        let amount = event.pointer("/data/object/amount_paid").and_then(|v| v.as_i64()).unwrap_or(0);
        crate::repo::insert_billing_event(&mut *tx, tenant_id, "invoice_payment_succeeded", common_money::Money::from_cents(amount), event.get("id").and_then(|v| v.as_str())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_status_mapping_covers_all_known_vendor_statuses() {
        assert_eq!(subscription_status_to_tenant_status("active"), "active");
        assert_eq!(subscription_status_to_tenant_status("trialing"), "active");
        assert_eq!(subscription_status_to_tenant_status("past_due"), "suspended");
        assert_eq!(subscription_status_to_tenant_status("unpaid"), "suspended");
        assert_eq!(subscription_status_to_tenant_status("incomplete"), "suspended");
        assert_eq!(subscription_status_to_tenant_status("canceled"), "canceled");
        assert_eq!(subscription_status_to_tenant_status("incomplete_expired"), "canceled");
        assert_eq!(subscription_status_to_tenant_status("anything_else"), "suspended");
    }
}
