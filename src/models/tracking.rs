use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::shipment::ShipmentStatus;

/// Append-only ledger entry. Immutable once written except for the
/// `is_latest` demotion when a newer event arrives for the same AWB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub awb: String,
    /// Carrier-reported status, verbatim.
    pub carrier_status: String,
    /// Canonical mapping of `carrier_status`; None when unrecognized.
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
    pub is_latest: bool,
    pub recorded_at: DateTime<Utc>,
}
