use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::directory::CarrierDirectory;
use crate::gateway::CarrierGateway;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::resolver::DeliveryMode;
use crate::store::shipments::ShipmentStore;
use crate::store::tracking::TrackingLedger;

pub struct AppState {
    pub mode: DeliveryMode,
    pub carrier_webhook_secret: Option<String>,
    pub pickup_postal_code: String,
    pub pickup_location_name: String,
    pub manual_charge: f64,
    pub manual_free_threshold: f64,
    pub manual_eta_days: u32,
    pub carriers: CarrierDirectory,
    pub orders: DashMap<Uuid, Order>,
    pub shipments: ShipmentStore,
    pub ledger: TrackingLedger,
    pub gateway: Arc<dyn CarrierGateway>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, gateway: Arc<dyn CarrierGateway>) -> Self {
        Self {
            mode: config.delivery_mode,
            carrier_webhook_secret: config.carrier_webhook_secret.clone(),
            pickup_postal_code: config.pickup_postal_code.clone(),
            pickup_location_name: config.pickup_location_name.clone(),
            manual_charge: config.manual_charge,
            manual_free_threshold: config.manual_free_threshold,
            manual_eta_days: config.manual_eta_days,
            carriers: CarrierDirectory::new(),
            orders: DashMap::new(),
            shipments: ShipmentStore::new(),
            ledger: TrackingLedger::new(),
            gateway,
            metrics: Metrics::new(),
        }
    }
}
