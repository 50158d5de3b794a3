use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::carrier::{
    Capabilities, CarrierProfile, CarrierTier, CoverageArea, DeliveryOutcome, Limits,
    PerformanceStats, PricingRules, SlaDays,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/carriers", post(create_carrier).get(list_carriers))
        .route("/carriers/:id", get(get_carrier).patch(update_carrier))
        .route("/carriers/:id/performance", post(record_performance))
        .route("/carriers/:id/charge", post(quote_charge))
}

#[derive(Deserialize)]
pub struct CreateCarrierRequest {
    pub name: String,
    pub code: String,
    pub tier: CarrierTier,
    pub coverage: Vec<CoverageArea>,
    pub pricing: PricingRules,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub sla: SlaDays,
    pub limits: Limits,
    #[serde(default)]
    pub preferred: bool,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Deserialize)]
pub struct UpdateCarrierRequest {
    pub active: Option<bool>,
    pub approved: Option<bool>,
    pub preferred: Option<bool>,
    pub priority: Option<i32>,
}

#[derive(Deserialize)]
pub struct ChargeQuoteRequest {
    pub weight_kg: f64,
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub cod_amount: f64,
    #[serde(default)]
    pub order_value: f64,
}

async fn create_carrier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCarrierRequest>,
) -> Result<Json<CarrierProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.coverage.is_empty() {
        return Err(AppError::BadRequest(
            "at least one coverage area is required".to_string(),
        ));
    }

    let profile = CarrierProfile {
        id: Uuid::new_v4(),
        name: payload.name,
        code: payload.code,
        tier: payload.tier,
        coverage: payload.coverage,
        pricing: payload.pricing,
        capabilities: payload.capabilities,
        sla: payload.sla,
        limits: payload.limits,
        active: true,
        // New partners start unapproved and stay out of option listings.
        approved: false,
        preferred: payload.preferred,
        priority: payload.priority,
        performance: PerformanceStats::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    state.carriers.insert(profile.clone());
    Ok(Json(profile))
}

async fn list_carriers(State(state): State<Arc<AppState>>) -> Json<Vec<CarrierProfile>> {
    Json(state.carriers.list())
}

async fn get_carrier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CarrierProfile>, AppError> {
    state
        .carriers
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("carrier profile {id} not found")))
}

async fn update_carrier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCarrierRequest>,
) -> Result<Json<CarrierProfile>, AppError> {
    let profile = state.carriers.update(id, |profile| {
        if let Some(active) = payload.active {
            profile.active = active;
        }
        if let Some(approved) = payload.approved {
            profile.approved = approved;
        }
        if let Some(preferred) = payload.preferred {
            profile.preferred = preferred;
        }
        if let Some(priority) = payload.priority {
            profile.priority = priority;
        }
    })?;
    Ok(Json(profile))
}

async fn record_performance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(outcome): Json<DeliveryOutcome>,
) -> Result<Json<CarrierProfile>, AppError> {
    let profile = state.carriers.update_performance(id, outcome)?;
    Ok(Json(profile))
}

async fn quote_charge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChargeQuoteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = state
        .carriers
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("carrier profile {id} not found")))?;

    let charge = crate::directory::pricing::calculate_charge(
        &profile,
        payload.weight_kg,
        payload.distance_km,
        payload.cod_amount,
        payload.order_value,
    );

    Ok(Json(serde_json::json!({ "charge": charge })))
}
