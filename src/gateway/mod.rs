pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured failure from the aggregator boundary. Callers never see a
/// panic or raw transport error; they match on the kind and degrade.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway authentication failed: {0}")]
    Auth(String),

    #[error("gateway request timed out: {0}")]
    Timeout(String),

    #[error("gateway network error: {0}")]
    Network(String),

    #[error("gateway rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub selling_price: f64,
    pub discount: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayCreateOrder {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_address: String,
    pub billing_city: String,
    pub billing_state: String,
    pub billing_pincode: String,
    pub billing_country: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<GatewayOrderItem>,
    pub payment_method: String,
    pub sub_total: f64,
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrderCreated {
    pub order_id: i64,
    pub shipment_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierQuote {
    pub courier_company_id: i64,
    pub courier_name: String,
    pub rate: f64,
    pub estimated_delivery_days: Option<String>,
    pub cod: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceabilityResponse {
    pub serviceable: bool,
    pub couriers: Vec<CourierQuote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaybillAssignment {
    pub awb_code: String,
    pub courier_company_id: i64,
    pub courier_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingScan {
    pub status: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub current_status: String,
    pub scans: Vec<TrackingScan>,
    pub expected_delivery_date: Option<String>,
}

/// Pass-through document generation (label, manifest, invoice, pickup slip)
/// returns an opaque URL; rendering happens on the aggregator's side.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUrl {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickupScheduled {
    pub pickup_token: String,
    pub scheduled_date: String,
}

/// The external carrier aggregator, behind a trait so the resolver and the
/// API layer can run against a mock in tests.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    async fn create_order(&self, order: GatewayCreateOrder) -> GatewayResult<GatewayOrderCreated>;

    async fn check_serviceability(
        &self,
        pickup_postal_code: &str,
        delivery_postal_code: &str,
        weight_kg: f64,
        cod: bool,
    ) -> GatewayResult<ServiceabilityResponse>;

    async fn generate_waybill(
        &self,
        shipment_id: i64,
        courier_id: i64,
    ) -> GatewayResult<WaybillAssignment>;

    async fn track_by_waybill(&self, awb: &str) -> GatewayResult<TrackingSnapshot>;

    async fn cancel(&self, awbs: &[String]) -> GatewayResult<()>;

    async fn generate_pickup(
        &self,
        shipment_ids: &[i64],
        date: NaiveDate,
    ) -> GatewayResult<PickupScheduled>;

    async fn generate_manifest(&self, shipment_ids: &[i64]) -> GatewayResult<DocumentUrl>;

    async fn generate_label(&self, shipment_ids: &[i64]) -> GatewayResult<DocumentUrl>;

    async fn generate_invoice(&self, order_ids: &[i64]) -> GatewayResult<DocumentUrl>;
}
