use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::AppError;
use crate::ingest::{normalize_carrier_status, verify_signature};
use crate::models::order::OrderStatus;
use crate::models::shipment::ShipmentStatus;
use crate::state::AppState;
use crate::store::shipments::StatusUpdate;
use crate::store::tracking::NewTrackingEvent;

pub const SIGNATURE_HEADER: &str = "x-carrier-signature";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/carrier", post(carrier_webhook))
}

/// Carrier callback ingestion. Delivery is at-least-once and unordered, so
/// everything that parses gets recorded; only a bad signature is refused.
/// Malformed or unresolvable payloads are acknowledged with 200 to keep the
/// carrier from retrying them forever.
async fn carrier_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = &state.carrier_webhook_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if !verify_signature(secret, &body, provided) {
            state
                .metrics
                .webhook_events_total
                .with_label_values(&["rejected_signature"])
                .inc();
            return Err(AppError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "malformed carrier webhook; acknowledging without retry");
            state
                .metrics
                .webhook_events_total
                .with_label_values(&["malformed"])
                .inc();
            return Ok(Json(json!({ "acknowledged": true, "applied": false })));
        }
    };

    let awb = string_field(&payload, &["awb", "awb_code"]);
    let carrier_status = string_field(&payload, &["current_status", "status", "shipment_status"]);

    let (Some(awb), Some(carrier_status)) = (awb, carrier_status) else {
        warn!("carrier webhook missing awb or status; acknowledging without retry");
        state
            .metrics
            .webhook_events_total
            .with_label_values(&["malformed"])
            .inc();
        return Ok(Json(json!({ "acknowledged": true, "applied": false })));
    };

    let Some(shipment) = state.shipments.get_by_awb(&awb) else {
        warn!(awb = %awb, "carrier webhook for unknown shipment; acknowledging");
        state
            .metrics
            .webhook_events_total
            .with_label_values(&["unknown_shipment"])
            .inc();
        return Ok(Json(json!({ "acknowledged": true, "applied": false })));
    };

    let canonical = normalize_carrier_status(&carrier_status);
    let status_date = date_field(&payload, &["status_date", "scan_date", "current_timestamp"])
        .unwrap_or_else(Utc::now);

    // History is never lossy: the event is recorded even when the status
    // string cannot be classified.
    state.ledger.record_event(
        &awb,
        NewTrackingEvent {
            shipment_id: shipment.id,
            carrier_status: carrier_status.clone(),
            canonical_status: canonical,
            status_date,
            location: string_field(&payload, &["location", "current_location"]),
            remarks: string_field(&payload, &["remarks", "instructions"]),
            activity: string_field(&payload, &["activity", "scan"]),
            delivery_person: string_field(&payload, &["courier_agent_name", "delivery_person"]),
            delivery_person_phone: string_field(&payload, &["courier_agent_phone"]),
            rto_date: date_field(&payload, &["rto_date"]),
            expected_delivery_date: date_field(&payload, &["etd", "expected_delivery_date"]),
            actual_delivery_date: date_field(&payload, &["delivered_date", "actual_delivery_date"]),
            raw_payload: payload.clone(),
        },
    );
    state.metrics.tracking_events_total.inc();

    let mut applied = false;
    if let Some(new_status) = canonical {
        if new_status != shipment.status {
            if !shipment.status.can_transition_to(new_status) {
                // Last-writer-wins is preserved on purpose; this is the
                // flagged late-webhook case.
                warn!(
                    awb = %awb,
                    from = ?shipment.status,
                    to = ?new_status,
                    "applying non-forward status transition from carrier webhook"
                );
            }

            state.shipments.update_status(
                shipment.order_id,
                new_status,
                StatusUpdate {
                    actual_delivery_date: (new_status == ShipmentStatus::Delivered)
                        .then_some(status_date),
                    rto_reason: matches!(
                        new_status,
                        ShipmentStatus::RtoInitiated | ShipmentStatus::RtoDelivered
                    )
                    .then(|| string_field(&payload, &["remarks", "instructions"]))
                    .flatten(),
                    ..StatusUpdate::default()
                },
            )?;
            applied = true;

            if let Some(mut order) = state.orders.get_mut(&shipment.order_id) {
                match new_status {
                    ShipmentStatus::Delivered => order.status = OrderStatus::Delivered,
                    ShipmentStatus::Cancelled => order.status = OrderStatus::Cancelled,
                    ShipmentStatus::Shipped | ShipmentStatus::InTransit => {
                        order.status = OrderStatus::Shipped;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(awb = %awb, status = %carrier_status, applied, "carrier webhook ingested");
    state
        .metrics
        .webhook_events_total
        .with_label_values(&["accepted"])
        .inc();

    Ok(Json(json!({ "acknowledged": true, "applied": applied })))
}

fn string_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn date_field(payload: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .and_then(parse_date)
    })
}

/// Carriers send RFC 3339 or the bare "YYYY-MM-DD HH:MM:SS" form; the
/// offset-free form is read as UTC.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
