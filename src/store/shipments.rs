use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::shipment::{Shipment, ShipmentStatus};

/// Extra fields attached to a status transition.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub rto_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub courier_name: Option<String>,
}

/// Shipments keyed by order id, so one-shipment-per-order is a uniqueness
/// property of the map itself rather than an application-side pre-check.
/// Records are never removed; terminal states persist for audit.
pub struct ShipmentStore {
    by_order: DashMap<Uuid, Shipment>,
    awb_index: DashMap<String, Uuid>,
}

impl ShipmentStore {
    pub fn new() -> Self {
        Self {
            by_order: DashMap::new(),
            awb_index: DashMap::new(),
        }
    }

    /// Inserts via the vacant entry, rejecting duplicates atomically.
    pub fn create(&self, shipment: Shipment) -> Result<Shipment, AppError> {
        match self.by_order.entry(shipment.order_id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "shipment already exists for order {}",
                shipment.order_id
            ))),
            Entry::Vacant(slot) => {
                if let Some(awb) = &shipment.awb {
                    self.awb_index.insert(awb.clone(), shipment.order_id);
                }
                slot.insert(shipment.clone());
                Ok(shipment)
            }
        }
    }

    pub fn get(&self, order_id: Uuid) -> Option<Shipment> {
        self.by_order.get(&order_id).map(|entry| entry.value().clone())
    }

    pub fn get_by_awb(&self, awb: &str) -> Option<Shipment> {
        let order_id = *self.awb_index.get(awb)?;
        self.get(order_id)
    }

    pub fn list(&self) -> Vec<Shipment> {
        self.by_order
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_order.is_empty()
    }

    /// Attaches a waybill obtained after creation (retried aggregator path).
    pub fn set_waybill(
        &self,
        order_id: Uuid,
        awb: String,
        courier_name: Option<String>,
    ) -> Result<Shipment, AppError> {
        let mut entry = self
            .by_order
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))?;

        self.awb_index.insert(awb.clone(), order_id);
        entry.awb = Some(awb);
        if courier_name.is_some() {
            entry.courier_name = courier_name;
        }
        entry.last_status_update = Utc::now();
        Ok(entry.value().clone())
    }

    /// Records a transition under the entry lock. Webhook-driven updates and
    /// admin overrides both come through here, so concurrent writers
    /// serialize (last writer wins) instead of racing read-modify-write.
    ///
    /// `actual_delivery_date` is only written on the transition into
    /// delivered, and only when unset; repeat delivered events keep the
    /// first recorded date.
    pub fn update_status(
        &self,
        order_id: Uuid,
        new_status: ShipmentStatus,
        extra: StatusUpdate,
    ) -> Result<Shipment, AppError> {
        let mut entry = self
            .by_order
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("shipment for order {order_id} not found")))?;

        if new_status == ShipmentStatus::Delivered && entry.actual_delivery_date.is_none() {
            entry.actual_delivery_date = Some(extra.actual_delivery_date.unwrap_or_else(Utc::now));
        }
        if new_status == ShipmentStatus::OutForDelivery {
            entry.delivery_attempts += 1;
        }
        if let Some(reason) = extra.rto_reason {
            entry.rto_reason = Some(reason);
        }
        if let Some(reason) = extra.cancellation_reason {
            entry.cancellation_reason = Some(reason);
        }
        if let Some(name) = extra.courier_name {
            entry.courier_name = Some(name);
        }

        entry.status = new_status;
        entry.last_status_update = Utc::now();
        Ok(entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{ShipmentStore, StatusUpdate};
    use crate::models::order::{Address, PaymentMode};
    use crate::models::shipment::{
        ChargeBreakdown, DeliveryMethod, PackageDetails, Shipment, ShipmentStatus,
    };

    fn address() -> Address {
        Address {
            name: "Asha".to_string(),
            phone: "9900000000".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
        }
    }

    fn shipment(order_seed: u128, awb: Option<&str>) -> Shipment {
        Shipment {
            id: Uuid::new_v4(),
            order_id: Uuid::from_u128(order_seed),
            order_number: format!("ORD-{order_seed}"),
            method: DeliveryMethod::Manual,
            aggregator_order_id: None,
            aggregator_shipment_id: None,
            awb: awb.map(str::to_string),
            status: ShipmentStatus::Processing,
            courier_name: None,
            shipping_address: address(),
            pickup_address: None,
            items: vec![],
            package: PackageDetails::default(),
            charges: ChargeBreakdown::default(),
            payment_mode: PaymentMode::Prepaid,
            total_value: 100.0,
            delivery_attempts: 0,
            rto_reason: None,
            cancellation_reason: None,
            actual_delivery_date: None,
            last_status_update: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn second_shipment_for_same_order_is_rejected() {
        let store = ShipmentStore::new();
        let first = store.create(shipment(1, Some("AWB1"))).unwrap();

        let err = store.create(shipment(1, Some("AWB2"))).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // Original untouched.
        let kept = store.get(first.order_id).unwrap();
        assert_eq!(kept.awb.as_deref(), Some("AWB1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_by_awb_resolves_the_owning_order() {
        let store = ShipmentStore::new();
        store.create(shipment(1, Some("AWB1"))).unwrap();

        let found = store.get_by_awb("AWB1").unwrap();
        assert_eq!(found.order_id, Uuid::from_u128(1));
        assert!(store.get_by_awb("AWB9").is_none());
    }

    #[test]
    fn delivered_date_is_set_once_and_kept() {
        let store = ShipmentStore::new();
        let order_id = Uuid::from_u128(1);
        store.create(shipment(1, None)).unwrap();

        let first_date = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let updated = store
            .update_status(
                order_id,
                ShipmentStatus::Delivered,
                StatusUpdate {
                    actual_delivery_date: Some(first_date),
                    ..StatusUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.actual_delivery_date, Some(first_date));

        let second_date = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let repeated = store
            .update_status(
                order_id,
                ShipmentStatus::Delivered,
                StatusUpdate {
                    actual_delivery_date: Some(second_date),
                    ..StatusUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(repeated.actual_delivery_date, Some(first_date));
    }

    #[test]
    fn out_for_delivery_increments_attempt_counter() {
        let store = ShipmentStore::new();
        let order_id = Uuid::from_u128(1);
        store.create(shipment(1, None)).unwrap();

        store
            .update_status(order_id, ShipmentStatus::OutForDelivery, StatusUpdate::default())
            .unwrap();
        store
            .update_status(order_id, ShipmentStatus::InTransit, StatusUpdate::default())
            .unwrap();
        let latest = store
            .update_status(order_id, ShipmentStatus::OutForDelivery, StatusUpdate::default())
            .unwrap();

        assert_eq!(latest.delivery_attempts, 2);
    }

    #[test]
    fn cancellation_reason_is_recorded() {
        let store = ShipmentStore::new();
        let order_id = Uuid::from_u128(1);
        store.create(shipment(1, None)).unwrap();

        let cancelled = store
            .update_status(
                order_id,
                ShipmentStatus::Cancelled,
                StatusUpdate {
                    cancellation_reason: Some("customer request".to_string()),
                    ..StatusUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(cancelled.status, ShipmentStatus::Cancelled);
        assert_eq!(
            cancelled.cancellation_reason.as_deref(),
            Some("customer request")
        );
    }
}
