use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CarrierTier {
    Local,
    Regional,
    National,
    International,
}

/// One serviceable region. Areas are toggleable independently of the
/// profile's own active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageArea {
    pub state: String,
    pub cities: Vec<String>,
    pub postal_codes: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CodSurcharge {
    /// Flat amount added when collecting cash on delivery.
    Fixed(f64),
    /// Percentage of the COD amount.
    Percentage(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRules {
    pub base_rate: f64,
    pub per_kg_rate: f64,
    pub per_km_rate: f64,
    pub cod_surcharge: CodSurcharge,
    pub fuel_surcharge: f64,
    pub handling_surcharge: f64,
    pub packaging_surcharge: f64,
    /// Percent of order value, applied only when the insurance capability is set.
    pub insurance_rate: f64,
    pub minimum_charge: f64,
    /// Order value at or above which delivery is free. Zero disables it.
    pub free_delivery_threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub cod: bool,
    pub express: bool,
    pub same_day: bool,
    pub scheduled: bool,
    pub tracking: bool,
    pub pickup: bool,
    pub returns: bool,
    pub insurance: bool,
}

/// Declared lead times in days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlaDays {
    pub standard: u32,
    pub express: u32,
    pub same_day: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    pub max_weight_kg: f64,
    pub max_dimension_cm: f64,
    pub max_order_value: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_orders: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
    pub avg_delivery_days: f64,
    pub avg_rating: f64,
}

impl PerformanceStats {
    /// Derived, never stored: keeps the counters as the single source of truth.
    pub fn success_rate(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }
        self.successful_deliveries as f64 / self.total_orders as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierProfile {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub tier: CarrierTier,
    pub coverage: Vec<CoverageArea>,
    pub pricing: PricingRules,
    pub capabilities: Capabilities,
    pub sla: SlaDays,
    pub limits: Limits,
    pub active: bool,
    pub approved: bool,
    pub preferred: bool,
    pub priority: i32,
    pub performance: PerformanceStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CarrierProfile {
    /// Whether any active coverage area matches the location. City matches
    /// only together with its state; postal codes match on their own.
    pub fn serves(&self, state: &str, city: &str, postal_code: &str) -> bool {
        self.coverage.iter().filter(|area| area.active).any(|area| {
            let state_city = !state.is_empty()
                && area.state.eq_ignore_ascii_case(state)
                && area
                    .cities
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(city));

            let postal = !postal_code.is_empty()
                && area.postal_codes.iter().any(|p| p == postal_code);

            state_city || postal
        })
    }
}

/// Post-delivery outcome reported back into the directory.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeliveryOutcome {
    pub is_successful: bool,
    pub delivery_days: Option<f64>,
    pub customer_rating: Option<f64>,
}
