use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::shipment::ShipmentStatus;
use crate::models::tracking::TrackingEvent;

/// Fields of an incoming carrier event, before it is stamped into the ledger.
#[derive(Debug, Clone)]
pub struct NewTrackingEvent {
    pub shipment_id: Uuid,
    pub carrier_status: String,
    pub canonical_status: Option<ShipmentStatus>,
    pub status_date: DateTime<Utc>,
    pub location: Option<String>,
    pub remarks: Option<String>,
    pub activity: Option<String>,
    pub delivery_person: Option<String>,
    pub delivery_person_phone: Option<String>,
    pub rto_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub raw_payload: serde_json::Value,
}

/// Append-only tracking history, one event list per AWB. The latest pointer
/// is insertion-ordered: the most recently recorded event is latest, even
/// when its carrier timestamp is older than a previous event's.
pub struct TrackingLedger {
    events: DashMap<String, Vec<TrackingEvent>>,
}

impl TrackingLedger {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    /// Demotes the previous latest event and appends the new one. Both steps
    /// happen under the per-AWB entry lock, so two concurrent deliveries for
    /// one AWB cannot both end up latest.
    pub fn record_event(&self, awb: &str, event: NewTrackingEvent) -> TrackingEvent {
        let stamped = TrackingEvent {
            id: Uuid::new_v4(),
            shipment_id: event.shipment_id,
            awb: awb.to_string(),
            carrier_status: event.carrier_status,
            canonical_status: event.canonical_status,
            status_date: event.status_date,
            location: event.location,
            remarks: event.remarks,
            activity: event.activity,
            delivery_person: event.delivery_person,
            delivery_person_phone: event.delivery_person_phone,
            rto_date: event.rto_date,
            expected_delivery_date: event.expected_delivery_date,
            actual_delivery_date: event.actual_delivery_date,
            raw_payload: event.raw_payload,
            is_latest: true,
            recorded_at: Utc::now(),
        };

        let mut history = self.events.entry(awb.to_string()).or_default();
        for existing in history.iter_mut() {
            existing.is_latest = false;
        }
        history.push(stamped.clone());

        stamped
    }

    pub fn history(&self, awb: &str) -> Vec<TrackingEvent> {
        self.events
            .get(awb)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn latest(&self, awb: &str) -> Option<TrackingEvent> {
        self.events
            .get(awb)?
            .iter()
            .find(|event| event.is_latest)
            .cloned()
    }

    pub fn event_count(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }
}
