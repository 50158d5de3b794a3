use crate::models::carrier::{CarrierProfile, CodSurcharge};

/// Deterministic delivery charge for a profile.
///
/// The minimum-charge floor is applied before the free-delivery override;
/// an order over the threshold ships free even when the floor alone would
/// produce a charge. That ordering is load-bearing.
pub fn calculate_charge(
    profile: &CarrierProfile,
    weight_kg: f64,
    distance_km: Option<f64>,
    cod_amount: f64,
    order_value: f64,
) -> f64 {
    let rules = &profile.pricing;
    let mut charge = rules.base_rate;

    if weight_kg > 1.0 {
        charge += (weight_kg - 1.0) * rules.per_kg_rate;
    }

    if let Some(distance) = distance_km {
        charge += distance * rules.per_km_rate;
    }

    if cod_amount > 0.0 {
        charge += match rules.cod_surcharge {
            CodSurcharge::Fixed(amount) => amount,
            CodSurcharge::Percentage(percent) => cod_amount * percent / 100.0,
        };
    }

    charge += rules.fuel_surcharge + rules.handling_surcharge + rules.packaging_surcharge;

    if profile.capabilities.insurance && order_value > 0.0 {
        charge += order_value * rules.insurance_rate / 100.0;
    }

    charge = charge.max(rules.minimum_charge);

    if rules.free_delivery_threshold > 0.0 && order_value >= rules.free_delivery_threshold {
        charge = 0.0;
    }

    round2(charge)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::calculate_charge;
    use crate::models::carrier::{
        Capabilities, CarrierProfile, CarrierTier, CodSurcharge, Limits, PerformanceStats,
        PricingRules, SlaDays,
    };

    fn profile(rules: PricingRules, insurance: bool) -> CarrierProfile {
        CarrierProfile {
            id: Uuid::from_u128(1),
            name: "test-carrier".to_string(),
            code: "TC".to_string(),
            tier: CarrierTier::Regional,
            coverage: vec![],
            pricing: rules,
            capabilities: Capabilities {
                insurance,
                ..Capabilities::default()
            },
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

    fn rules() -> PricingRules {
        PricingRules {
            base_rate: 40.0,
            per_kg_rate: 15.0,
            per_km_rate: 0.0,
            cod_surcharge: CodSurcharge::Fixed(0.0),
            fuel_surcharge: 0.0,
            handling_surcharge: 0.0,
            packaging_surcharge: 0.0,
            insurance_rate: 0.0,
            minimum_charge: 40.0,
            free_delivery_threshold: 500.0,
        }
    }

    #[test]
    fn free_delivery_threshold_overrides_minimum_floor() {
        let p = profile(rules(), false);
        let charge = calculate_charge(&p, 1.0, None, 0.0, 600.0);
        assert_eq!(charge, 0.0);
    }

    #[test]
    fn weight_over_one_unit_is_charged_per_kg() {
        let p = profile(rules(), false);
        let charge = calculate_charge(&p, 3.0, None, 0.0, 100.0);
        assert_eq!(charge, 70.0);
    }

    #[test]
    fn first_unit_of_weight_is_included_in_base() {
        let p = profile(rules(), false);
        let light = calculate_charge(&p, 0.4, None, 0.0, 100.0);
        let one_kg = calculate_charge(&p, 1.0, None, 0.0, 100.0);
        assert_eq!(light, one_kg);
    }

    #[test]
    fn minimum_charge_floor_lifts_cheap_shipments() {
        let mut r = rules();
        r.base_rate = 10.0;
        r.minimum_charge = 35.0;
        r.free_delivery_threshold = 0.0;
        let p = profile(r, false);

        assert_eq!(calculate_charge(&p, 1.0, None, 0.0, 100.0), 35.0);
    }

    #[test]
    fn percentage_cod_surcharge_applies_only_when_collecting() {
        let mut r = rules();
        r.cod_surcharge = CodSurcharge::Percentage(2.0);
        r.free_delivery_threshold = 0.0;
        let p = profile(r, false);

        assert_eq!(calculate_charge(&p, 1.0, None, 0.0, 100.0), 40.0);
        assert_eq!(calculate_charge(&p, 1.0, None, 250.0, 100.0), 45.0);
    }

    #[test]
    fn fixed_cod_surcharge_ignores_amount() {
        let mut r = rules();
        r.cod_surcharge = CodSurcharge::Fixed(25.0);
        r.free_delivery_threshold = 0.0;
        let p = profile(r, false);

        assert_eq!(calculate_charge(&p, 1.0, None, 999.0, 100.0), 65.0);
    }

    #[test]
    fn insurance_needs_capability_and_positive_order_value() {
        let mut r = rules();
        r.insurance_rate = 1.0;
        r.free_delivery_threshold = 0.0;

        let without = profile(r.clone(), false);
        assert_eq!(calculate_charge(&without, 1.0, None, 0.0, 200.0), 40.0);

        let with = profile(r.clone(), true);
        assert_eq!(calculate_charge(&with, 1.0, None, 0.0, 200.0), 42.0);
        assert_eq!(calculate_charge(&with, 1.0, None, 0.0, 0.0), 40.0);
    }

    #[test]
    fn distance_component_only_when_supplied() {
        let mut r = rules();
        r.per_km_rate = 0.5;
        r.free_delivery_threshold = 0.0;
        let p = profile(r, false);

        assert_eq!(calculate_charge(&p, 1.0, None, 0.0, 100.0), 40.0);
        assert_eq!(calculate_charge(&p, 1.0, Some(20.0), 0.0, 100.0), 50.0);
    }

    #[test]
    fn charge_is_deterministic_and_rounded() {
        let mut r = rules();
        r.cod_surcharge = CodSurcharge::Percentage(2.333);
        r.free_delivery_threshold = 0.0;
        let p = profile(r, false);

        let first = calculate_charge(&p, 2.7, None, 123.45, 100.0);
        let second = calculate_charge(&p, 2.7, None, 123.45, 100.0);
        assert_eq!(first, second);
        // 40 + 1.7*15 + 123.45*2.333% = 68.3800885, rounded to 2 places.
        assert_eq!(first, 68.38);
    }
}
