use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Address, LineItem, Order, OrderStatus, PaymentMode};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(register_order))
        .route("/orders/:id", get(get_order))
}

/// Order snapshot pushed in from order management.
#[derive(Deserialize)]
pub struct RegisterOrderRequest {
    pub order_number: String,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub items: Vec<LineItem>,
    pub payment_mode: PaymentMode,
    pub subtotal: f64,
    pub total: f64,
}

async fn register_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.order_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "order_number cannot be empty".to_string(),
        ));
    }
    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    let order = Order {
        id: Uuid::new_v4(),
        order_number: payload.order_number,
        shipping_address: payload.shipping_address,
        billing_address: payload.billing_address,
        items: payload.items,
        payment_mode: payload.payment_mode,
        subtotal: payload.subtotal,
        total: payload.total,
        status: OrderStatus::Placed,
        delivery: None,
        created_at: Utc::now(),
    };

    state.orders.insert(order.id, order.clone());
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}
