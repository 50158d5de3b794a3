use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::OrderStatus;
use crate::models::shipment::{DeliveryMethod, Shipment, ShipmentStatus};
use crate::models::tracking::TrackingEvent;
use crate::state::AppState;
use crate::store::shipments::StatusUpdate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments", get(list_shipments))
        .route("/shipments/:order_id", get(get_shipment))
        .route("/shipments/:order_id/status", patch(override_status))
        .route("/shipments/:order_id/cancel", post(cancel_shipment))
        .route("/shipments/:order_id/tracking", get(get_tracking))
        .route("/shipments/:order_id/tracking/live", get(get_live_tracking))
        .route("/serviceability", get(check_serviceability))
        .route("/pickups", post(schedule_pickup))
        .route("/documents/:kind", post(generate_document))
}

async fn list_shipments(State(state): State<Arc<AppState>>) -> Json<Vec<Shipment>> {
    Json(state.shipments.list())
}

async fn get_shipment(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Shipment>, AppError> {
    state
        .shipments
        .get(order_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))
}

#[derive(Deserialize)]
pub struct OverrideStatusRequest {
    pub status: ShipmentStatus,
    pub reason: Option<String>,
}

/// Admin override. Uses the same atomic update primitive as webhook-driven
/// transitions, so the two paths cannot interleave a read-modify-write.
async fn override_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OverrideStatusRequest>,
) -> Result<Json<Shipment>, AppError> {
    let extra = StatusUpdate {
        rto_reason: matches!(
            payload.status,
            ShipmentStatus::RtoInitiated | ShipmentStatus::RtoDelivered
        )
        .then(|| payload.reason.clone())
        .flatten(),
        cancellation_reason: matches!(payload.status, ShipmentStatus::Cancelled)
            .then(|| payload.reason.clone())
            .flatten(),
        ..StatusUpdate::default()
    };

    let shipment = state.shipments.update_status(order_id, payload.status, extra)?;
    Ok(Json(shipment))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

async fn cancel_shipment(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state
        .shipments
        .get(order_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))?;

    if shipment.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "shipment is already {:?}",
            shipment.status
        )));
    }

    // Aggregator shipments are cancelled upstream first; a gateway refusal
    // leaves the local record untouched so the admin can retry.
    if matches!(shipment.method, DeliveryMethod::ExternalAggregator { .. }) {
        if let Some(awb) = &shipment.awb {
            match state.gateway.cancel(std::slice::from_ref(awb)).await {
                Ok(()) => state.metrics.observe_gateway("cancel", true),
                Err(err) => {
                    state.metrics.observe_gateway("cancel", false);
                    return Err(AppError::Gateway(err));
                }
            }
        }
    }

    let cancelled = state.shipments.update_status(
        order_id,
        ShipmentStatus::Cancelled,
        StatusUpdate {
            cancellation_reason: payload.reason,
            ..StatusUpdate::default()
        },
    )?;

    if let Some(mut order) = state.orders.get_mut(&order_id) {
        order.status = OrderStatus::Cancelled;
    }

    Ok(Json(cancelled))
}

#[derive(Serialize)]
struct TrackingResponse {
    shipment_status: ShipmentStatus,
    awb: Option<String>,
    courier_name: Option<String>,
    latest: Option<TrackingEvent>,
    history: Vec<TrackingEvent>,
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<TrackingResponse>, AppError> {
    let shipment = state
        .shipments
        .get(order_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))?;

    let (latest, history) = match &shipment.awb {
        Some(awb) => (state.ledger.latest(awb), state.ledger.history(awb)),
        None => (None, Vec::new()),
    };

    Ok(Json(TrackingResponse {
        shipment_status: shipment.status,
        awb: shipment.awb,
        courier_name: shipment.courier_name,
        latest,
        history,
    }))
}

/// Live snapshot straight from the aggregator, bypassing the local ledger.
async fn get_live_tracking(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let shipment = state
        .shipments
        .get(order_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))?;

    let awb = shipment.awb.ok_or_else(|| {
        AppError::BadRequest(format!("shipment for order {order_id} has no waybill"))
    })?;

    match state.gateway.track_by_waybill(&awb).await {
        Ok(snapshot) => {
            state.metrics.observe_gateway("track", true);
            Ok(Json(json!({
                "awb": awb,
                "current_status": snapshot.current_status,
                "expected_delivery_date": snapshot.expected_delivery_date,
                "scans": snapshot.scans,
            })))
        }
        Err(err) => {
            state.metrics.observe_gateway("track", false);
            Err(AppError::Gateway(err))
        }
    }
}

#[derive(Deserialize)]
pub struct ServiceabilityQuery {
    pub pickup_postal_code: Option<String>,
    pub delivery_postal_code: String,
    #[serde(default = "default_weight")]
    pub weight_kg: f64,
    #[serde(default)]
    pub cod: bool,
}

fn default_weight() -> f64 {
    0.5
}

async fn check_serviceability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceabilityQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pickup = query
        .pickup_postal_code
        .unwrap_or_else(|| state.pickup_postal_code.clone());

    match state
        .gateway
        .check_serviceability(&pickup, &query.delivery_postal_code, query.weight_kg, query.cod)
        .await
    {
        Ok(response) => {
            state.metrics.observe_gateway("serviceability", true);
            Ok(Json(json!({
                "serviceable": response.serviceable,
                "couriers": response.couriers,
            })))
        }
        Err(err) => {
            state.metrics.observe_gateway("serviceability", false);
            Err(AppError::Gateway(err))
        }
    }
}

#[derive(Deserialize)]
pub struct PickupRequest {
    pub order_ids: Vec<Uuid>,
    pub date: NaiveDate,
}

async fn schedule_pickup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PickupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let shipment_ids = aggregator_shipment_ids(&state, &payload.order_ids)?;

    match state.gateway.generate_pickup(&shipment_ids, payload.date).await {
        Ok(scheduled) => {
            state.metrics.observe_gateway("generate_pickup", true);
            Ok(Json(json!({
                "pickup_token": scheduled.pickup_token,
                "scheduled_date": scheduled.scheduled_date,
            })))
        }
        Err(err) => {
            state.metrics.observe_gateway("generate_pickup", false);
            Err(AppError::Gateway(err))
        }
    }
}

#[derive(Deserialize)]
pub struct DocumentRequest {
    pub order_ids: Vec<Uuid>,
}

/// Label, manifest and invoice rendering are opaque external operations;
/// the response is just the aggregator's document URL.
async fn generate_document(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(payload): Json<DocumentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = match kind.as_str() {
        "label" => {
            let ids = aggregator_shipment_ids(&state, &payload.order_ids)?;
            state.gateway.generate_label(&ids).await
        }
        "manifest" => {
            let ids = aggregator_shipment_ids(&state, &payload.order_ids)?;
            state.gateway.generate_manifest(&ids).await
        }
        "invoice" => {
            let ids = aggregator_order_ids(&state, &payload.order_ids)?;
            state.gateway.generate_invoice(&ids).await
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "unknown document kind: {other}"
            )));
        }
    };

    let operation = format!("generate_{kind}");
    match result {
        Ok(document) => {
            state.metrics.observe_gateway(&operation, true);
            Ok(Json(json!({ "url": document.url })))
        }
        Err(err) => {
            state.metrics.observe_gateway(&operation, false);
            Err(AppError::Gateway(err))
        }
    }
}

fn aggregator_shipment_ids(state: &AppState, order_ids: &[Uuid]) -> Result<Vec<i64>, AppError> {
    order_ids
        .iter()
        .map(|order_id| {
            state
                .shipments
                .get(*order_id)
                .and_then(|shipment| shipment.aggregator_shipment_id)
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "order {order_id} has no aggregator shipment"
                    ))
                })
        })
        .collect()
}

fn aggregator_order_ids(state: &AppState, order_ids: &[Uuid]) -> Result<Vec<i64>, AppError> {
    order_ids
        .iter()
        .map(|order_id| {
            state
                .shipments
                .get(*order_id)
                .and_then(|shipment| shipment.aggregator_order_id)
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "order {order_id} has no aggregator order"
                    ))
                })
        })
        .collect()
}
