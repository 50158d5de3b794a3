pub mod pricing;

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::carrier::{CarrierProfile, DeliveryOutcome};

/// In-memory collection of delivery-company partner profiles.
pub struct CarrierDirectory {
    profiles: DashMap<Uuid, CarrierProfile>,
}

impl CarrierDirectory {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    pub fn insert(&self, profile: CarrierProfile) {
        self.profiles.insert(profile.id, profile);
    }

    pub fn get(&self, id: Uuid) -> Option<CarrierProfile> {
        self.profiles.get(&id).map(|entry| entry.value().clone())
    }

    /// Applies an edit in place under the entry lock. Admin flag changes and
    /// performance updates for the same profile serialize here instead of
    /// racing a clone-and-reinsert.
    pub fn update<F>(&self, id: Uuid, apply: F) -> Result<CarrierProfile, AppError>
    where
        F: FnOnce(&mut CarrierProfile),
    {
        let mut entry = self
            .profiles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("carrier profile {id} not found")))?;
        apply(&mut entry);
        entry.updated_at = chrono::Utc::now();
        Ok(entry.value().clone())
    }

    pub fn list(&self) -> Vec<CarrierProfile> {
        self.profiles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Active, approved profiles covering the location, best first:
    /// preferred, then admin priority, then performance rating.
    pub fn find_serving_location(
        &self,
        state: &str,
        city: &str,
        postal_code: &str,
    ) -> Result<Vec<CarrierProfile>, AppError> {
        if state.is_empty() && city.is_empty() && postal_code.is_empty() {
            return Err(AppError::BadRequest(
                "at least one of state, city or postal_code is required".to_string(),
            ));
        }

        let mut matches: Vec<CarrierProfile> = self
            .profiles
            .iter()
            .filter(|entry| {
                let profile = entry.value();
                profile.active && profile.approved && profile.serves(state, city, postal_code)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| {
            b.preferred
                .cmp(&a.preferred)
                .then(b.priority.cmp(&a.priority))
                .then(
                    b.performance
                        .avg_rating
                        .total_cmp(&a.performance.avg_rating),
                )
        });

        Ok(matches)
    }

    /// Folds a delivery outcome into the profile's rolling counters. Runs
    /// under the map's entry lock, so concurrent updates for one profile
    /// serialize instead of losing increments.
    pub fn update_performance(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
    ) -> Result<CarrierProfile, AppError> {
        let mut entry = self
            .profiles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("carrier profile {id} not found")))?;

        let stats = &mut entry.performance;
        stats.total_orders += 1;
        if outcome.is_successful {
            stats.successful_deliveries += 1;
        } else {
            stats.failed_deliveries += 1;
        }

        let n = stats.total_orders as f64;
        if let Some(days) = outcome.delivery_days {
            stats.avg_delivery_days = incremental_mean(stats.avg_delivery_days, n, days);
        }
        if let Some(rating) = outcome.customer_rating {
            stats.avg_rating = incremental_mean(stats.avg_rating, n, rating);
        }

        entry.updated_at = chrono::Utc::now();
        Ok(entry.value().clone())
    }
}

fn incremental_mean(old_avg: f64, n: f64, new_value: f64) -> f64 {
    (old_avg * (n - 1.0) + new_value) / n
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::CarrierDirectory;
    use crate::models::carrier::{
        Capabilities, CarrierProfile, CarrierTier, CodSurcharge, CoverageArea, DeliveryOutcome,
        Limits, PerformanceStats, PricingRules, SlaDays,
    };

    fn profile(id_seed: u128, name: &str) -> CarrierProfile {
        CarrierProfile {
            id: Uuid::from_u128(id_seed),
            name: name.to_string(),
            code: name.to_uppercase(),
            tier: CarrierTier::Regional,
            coverage: vec![CoverageArea {
                state: "Karnataka".to_string(),
                cities: vec!["Bengaluru".to_string()],
                postal_codes: vec!["560001".to_string()],
                active: true,
            }],
            pricing: PricingRules {
                base_rate: 40.0,
                per_kg_rate: 15.0,
                per_km_rate: 0.0,
                cod_surcharge: CodSurcharge::Fixed(0.0),
                fuel_surcharge: 0.0,
                handling_surcharge: 0.0,
                packaging_surcharge: 0.0,
                insurance_rate: 0.0,
                minimum_charge: 40.0,
                free_delivery_threshold: 0.0,
            },
            capabilities: Capabilities::default(),
            sla: SlaDays {
                standard: 3,
                express: 1,
                same_day: 0,
            },
            limits: Limits {
                max_weight_kg: 30.0,
                max_dimension_cm: 200.0,
                max_order_value: 100_000.0,
            },
            active: true,
            approved: true,
            preferred: false,
            priority: 0,
            performance: PerformanceStats::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_location_is_rejected() {
        let directory = CarrierDirectory::new();
        assert!(directory.find_serving_location("", "", "").is_err());
    }

    #[test]
    fn matches_by_state_and_city_or_postal_code() {
        let directory = CarrierDirectory::new();
        directory.insert(profile(1, "alpha"));

        let by_city = directory
            .find_serving_location("Karnataka", "Bengaluru", "")
            .unwrap();
        assert_eq!(by_city.len(), 1);

        let by_postal = directory.find_serving_location("", "", "560001").unwrap();
        assert_eq!(by_postal.len(), 1);

        let wrong_city = directory
            .find_serving_location("Karnataka", "Mysuru", "")
            .unwrap();
        assert!(wrong_city.is_empty());
    }

    #[test]
    fn unapproved_and_inactive_profiles_are_excluded() {
        let directory = CarrierDirectory::new();

        let mut inactive = profile(1, "inactive");
        inactive.active = false;
        directory.insert(inactive);

        let mut unapproved = profile(2, "unapproved");
        unapproved.approved = false;
        directory.insert(unapproved);

        let mut area_off = profile(3, "area-off");
        area_off.coverage[0].active = false;
        directory.insert(area_off);

        let found = directory.find_serving_location("", "", "560001").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn ranking_prefers_flag_then_priority_then_rating() {
        let directory = CarrierDirectory::new();

        let mut rated = profile(1, "rated");
        rated.performance.avg_rating = 4.8;
        directory.insert(rated);

        let mut prioritized = profile(2, "prioritized");
        prioritized.priority = 10;
        directory.insert(prioritized);

        let mut preferred = profile(3, "preferred");
        preferred.preferred = true;
        directory.insert(preferred);

        let found = directory.find_serving_location("", "", "560001").unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["preferred", "prioritized", "rated"]);
    }

    #[test]
    fn incremental_mean_matches_batch_mean() {
        let directory = CarrierDirectory::new();
        let id = Uuid::from_u128(1);
        directory.insert(profile(1, "alpha"));

        for (days, rating) in [(2.0, 5.0), (4.0, 3.0), (3.0, 4.0)] {
            directory
                .update_performance(
                    id,
                    DeliveryOutcome {
                        is_successful: true,
                        delivery_days: Some(days),
                        customer_rating: Some(rating),
                    },
                )
                .unwrap();
        }

        let stats = directory.get(id).unwrap().performance;
        assert_eq!(stats.avg_delivery_days, 3.0);
        assert_eq!(stats.avg_rating, 4.0);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.successful_deliveries, 3);
        assert_eq!(stats.success_rate(), 1.0);
    }

    #[test]
    fn flag_edits_do_not_clobber_concurrent_performance_updates() {
        let directory = CarrierDirectory::new();
        let id = Uuid::from_u128(1);
        directory.insert(profile(1, "alpha"));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    directory
                        .update_performance(
                            id,
                            DeliveryOutcome {
                                is_successful: true,
                                delivery_days: None,
                                customer_rating: None,
                            },
                        )
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..200 {
                    directory.update(id, |profile| profile.priority = i).unwrap();
                }
            });
        });

        let updated = directory.get(id).unwrap();
        assert_eq!(updated.performance.total_orders, 200);
        assert_eq!(updated.performance.successful_deliveries, 200);
    }

    #[test]
    fn failed_outcome_increments_failure_counter() {
        let directory = CarrierDirectory::new();
        let id = Uuid::from_u128(1);
        directory.insert(profile(1, "alpha"));

        directory
            .update_performance(
                id,
                DeliveryOutcome {
                    is_successful: false,
                    delivery_days: None,
                    customer_rating: None,
                },
            )
            .unwrap();

        let stats = directory.get(id).unwrap().performance;
        assert_eq!(stats.failed_deliveries, 1);
        assert_eq!(stats.success_rate(), 0.0);
    }
}
