use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{Address, LineItem, PaymentMode};

/// Which backend fulfils the shipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DeliveryMethod {
    Manual,
    CarrierProfile { profile_id: Uuid },
    ExternalAggregator { courier_id: i64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
    Lost,
    Damaged,
    RtoInitiated,
    RtoDelivered,
}

impl ShipmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Cancelled | ShipmentStatus::RtoDelivered
        )
    }

    /// Legal forward transitions. Side branches are reachable from any
    /// non-terminal state; the main line only moves forward.
    pub fn can_transition_to(self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;

        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }

        match next {
            Returned | Cancelled | Lost | Damaged | RtoInitiated => true,
            RtoDelivered => self == RtoInitiated,
            Pending => false,
            Processing => self == Pending,
            Shipped => matches!(self, Pending | Processing),
            InTransit => matches!(self, Pending | Processing | Shipped),
            OutForDelivery => matches!(self, Pending | Processing | Shipped | InTransit),
            Delivered => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    pub freight: f64,
    pub cod: f64,
    pub surcharges: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackageDetails {
    pub weight_kg: f64,
    pub length_cm: f64,
    pub breadth_cm: f64,
    pub height_cm: f64,
}

impl Default for PackageDetails {
    fn default() -> Self {
        Self {
            weight_kg: 0.5,
            length_cm: 10.0,
            breadth_cm: 10.0,
            height_cm: 10.0,
        }
    }
}

/// One shipment per order. Address and line-item fields are snapshots taken
/// at creation; later catalog or profile edits do not alter them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub method: DeliveryMethod,
    pub aggregator_order_id: Option<i64>,
    pub aggregator_shipment_id: Option<i64>,
    pub awb: Option<String>,
    pub status: ShipmentStatus,
    pub courier_name: Option<String>,
    pub shipping_address: Address,
    pub pickup_address: Option<Address>,
    pub items: Vec<LineItem>,
    pub package: PackageDetails,
    pub charges: ChargeBreakdown,
    pub payment_mode: PaymentMode,
    pub total_value: f64,
    pub delivery_attempts: u32,
    pub rto_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub last_status_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::ShipmentStatus::*;

    #[test]
    fn main_line_moves_forward_only() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(OutForDelivery));
        assert!(OutForDelivery.can_transition_to(Delivered));

        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!InTransit.can_transition_to(Processing));
    }

    #[test]
    fn side_branches_reachable_from_any_non_terminal_state() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(InTransit.can_transition_to(Lost));
        assert!(OutForDelivery.can_transition_to(RtoInitiated));
        assert!(RtoInitiated.can_transition_to(RtoDelivered));

        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!RtoDelivered.can_transition_to(Returned));
        assert!(!Shipped.can_transition_to(RtoDelivered));
    }
}
