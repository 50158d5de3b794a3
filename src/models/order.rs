use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub unit_price: f64,
    pub discount: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Prepaid,
    Cod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// Delivery metadata written back onto the order by assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub method: crate::models::shipment::DeliveryMethod,
    pub courier_name: Option<String>,
    pub charge: f64,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Mirror of the order-management collaborator's record. Read for shipment
/// creation, written back with assignment metadata and status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub items: Vec<LineItem>,
    pub payment_mode: PaymentMode,
    pub subtotal: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub delivery: Option<DeliveryAssignment>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// COD orders collect the full total on delivery.
    pub fn cod_amount(&self) -> f64 {
        match self.payment_mode {
            PaymentMode::Cod => self.total,
            PaymentMode::Prepaid => 0.0,
        }
    }
}
