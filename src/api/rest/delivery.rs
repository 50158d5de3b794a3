use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::shipment::DeliveryMethod;
use crate::resolver::{self, AssignmentOutcome, DeliveryLocation, DeliveryOption, OrderContext};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery/options", post(query_options))
        .route("/orders/:id/assign", post(assign_delivery))
}

#[derive(Deserialize)]
pub struct OptionsRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default = "default_weight")]
    pub weight_kg: f64,
    #[serde(default)]
    pub cod_amount: f64,
    #[serde(default)]
    pub order_value: f64,
}

fn default_weight() -> f64 {
    0.5
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub method: DeliveryMethod,
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "admin".to_string()
}

async fn query_options(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptionsRequest>,
) -> Result<Json<Vec<DeliveryOption>>, AppError> {
    let options = resolver::get_options(
        &state,
        DeliveryLocation {
            state: &payload.state,
            city: &payload.city,
            postal_code: &payload.postal_code,
        },
        OrderContext {
            weight_kg: payload.weight_kg,
            cod_amount: payload.cod_amount,
            order_value: payload.order_value,
        },
    )
    .await?;

    Ok(Json(options))
}

async fn assign_delivery(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let outcome = resolver::assign(&state, order_id, payload.method, &payload.actor).await?;
    Ok(Json(outcome))
}
