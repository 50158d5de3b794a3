use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::pricing::calculate_charge;
use crate::error::AppError;
use crate::gateway::{GatewayCreateOrder, GatewayOrderItem};
use crate::models::carrier::CarrierProfile;
use crate::models::order::{DeliveryAssignment, Order, PaymentMode};
use crate::models::shipment::{
    ChargeBreakdown, DeliveryMethod, PackageDetails, Shipment, ShipmentStatus,
};
use crate::state::AppState;

/// Operator-wide strategy selection. Threaded in through config so tests can
/// run several configurations side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Manual,
    Directory,
    Aggregator,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "manual" => Ok(DeliveryMode::Manual),
            "directory" => Ok(DeliveryMode::Directory),
            "aggregator" => Ok(DeliveryMode::Aggregator),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSource {
    Manual,
    Directory,
    Aggregator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOption {
    pub method: DeliveryMethod,
    pub courier_name: String,
    pub charge: f64,
    pub eta_days: Option<u32>,
    pub cod_available: bool,
    pub express_available: bool,
    pub tracking_available: bool,
    pub source: OptionSource,
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryLocation<'a> {
    pub state: &'a str,
    pub city: &'a str,
    pub postal_code: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderContext {
    pub weight_kg: f64,
    pub cod_amount: f64,
    pub order_value: f64,
}

/// Outcome of an assignment. `degraded` marks the recoverable state where
/// the admin's choice is recorded but the aggregator leg failed; retrying
/// the same assignment resumes where it stopped.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub order: Order,
    pub shipment: Option<Shipment>,
    pub waybill: Option<String>,
    pub degraded: bool,
    pub message: String,
}

/// Enumerates delivery options for a location, best first. Never returns an
/// empty list: when the configured strategy has nothing viable the manual
/// option stands in, so a customer never sees "no delivery available".
pub async fn get_options(
    state: &Arc<AppState>,
    location: DeliveryLocation<'_>,
    ctx: OrderContext,
) -> Result<Vec<DeliveryOption>, AppError> {
    if location.state.is_empty() && location.city.is_empty() && location.postal_code.is_empty() {
        return Err(AppError::BadRequest(
            "at least one of state, city or postal_code is required".to_string(),
        ));
    }

    let mut options = match state.mode {
        DeliveryMode::Manual => Vec::new(),
        DeliveryMode::Directory => directory_options(state, location, ctx)?,
        DeliveryMode::Aggregator => {
            let via_gateway = aggregator_options(state, location, ctx).await;
            if via_gateway.is_empty() {
                // Gateway down or lane unserviceable; directory partners may
                // still cover the destination.
                directory_options(state, location, ctx)?
            } else {
                via_gateway
            }
        }
    };

    let source = match state.mode {
        DeliveryMode::Manual => "manual",
        DeliveryMode::Directory => "directory",
        DeliveryMode::Aggregator => "aggregator",
    };
    state
        .metrics
        .option_queries_total
        .with_label_values(&[source])
        .inc();

    if options.is_empty() {
        options.push(manual_option(state, ctx));
    }

    Ok(options)
}

fn manual_option(state: &AppState, ctx: OrderContext) -> DeliveryOption {
    let free = state.manual_free_threshold > 0.0 && ctx.order_value >= state.manual_free_threshold;
    DeliveryOption {
        method: DeliveryMethod::Manual,
        courier_name: "Store Delivery".to_string(),
        charge: if free { 0.0 } else { state.manual_charge },
        eta_days: Some(state.manual_eta_days),
        cod_available: true,
        express_available: false,
        tracking_available: false,
        source: OptionSource::Manual,
    }
}

fn directory_options(
    state: &AppState,
    location: DeliveryLocation<'_>,
    ctx: OrderContext,
) -> Result<Vec<DeliveryOption>, AppError> {
    let profiles = state.carriers.find_serving_location(
        location.state,
        location.city,
        location.postal_code,
    )?;

    Ok(profiles
        .iter()
        .filter(|profile| profile_can_carry(profile, ctx))
        .map(|profile| DeliveryOption {
            method: DeliveryMethod::CarrierProfile {
                profile_id: profile.id,
            },
            courier_name: profile.name.clone(),
            charge: calculate_charge(profile, ctx.weight_kg, None, ctx.cod_amount, ctx.order_value),
            eta_days: Some(profile.sla.standard),
            cod_available: profile.capabilities.cod,
            express_available: profile.capabilities.express,
            tracking_available: profile.capabilities.tracking,
            source: OptionSource::Directory,
        })
        .collect())
}

fn profile_can_carry(profile: &CarrierProfile, ctx: OrderContext) -> bool {
    if ctx.cod_amount > 0.0 && !profile.capabilities.cod {
        return false;
    }
    ctx.weight_kg <= profile.limits.max_weight_kg && ctx.order_value <= profile.limits.max_order_value
}

async fn aggregator_options(
    state: &AppState,
    location: DeliveryLocation<'_>,
    ctx: OrderContext,
) -> Vec<DeliveryOption> {
    let result = state
        .gateway
        .check_serviceability(
            &state.pickup_postal_code,
            location.postal_code,
            ctx.weight_kg,
            ctx.cod_amount > 0.0,
        )
        .await;

    let response = match result {
        Ok(response) => {
            state.metrics.observe_gateway("serviceability", true);
            response
        }
        Err(err) => {
            state.metrics.observe_gateway("serviceability", false);
            warn!(error = %err, "serviceability check failed; degrading to fallback options");
            return Vec::new();
        }
    };

    if !response.serviceable {
        return Vec::new();
    }

    let mut options: Vec<DeliveryOption> = response
        .couriers
        .iter()
        .filter(|quote| ctx.cod_amount <= 0.0 || quote.cod == Some(1))
        .map(|quote| DeliveryOption {
            method: DeliveryMethod::ExternalAggregator {
                courier_id: quote.courier_company_id,
            },
            courier_name: quote.courier_name.clone(),
            charge: quote.rate,
            eta_days: quote
                .estimated_delivery_days
                .as_deref()
                .and_then(|days| days.parse().ok()),
            cod_available: quote.cod == Some(1),
            express_available: false,
            tracking_available: true,
            source: OptionSource::Aggregator,
        })
        .collect();

    options.sort_by(|a, b| a.charge.total_cmp(&b.charge));
    options
}

/// Assigns a delivery method to an order and creates its shipment.
///
/// The chosen method is re-validated against the order's current shipping
/// location before anything is written, so a stale client-side offer cannot
/// route an order through a carrier that no longer covers it.
pub async fn assign(
    state: &Arc<AppState>,
    order_id: Uuid,
    method: DeliveryMethod,
    actor: &str,
) -> Result<AssignmentOutcome, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.is_terminal() {
        return Err(AppError::Conflict(format!(
            "order {order_id} is {:?}; delivery cannot be reassigned",
            order.status
        )));
    }

    let ctx = OrderContext {
        weight_kg: estimate_weight(&order),
        cod_amount: order.cod_amount(),
        order_value: order.total,
    };

    let (charge, courier_name) = validate_method(state, &order, &method, ctx).await?;

    let assignment = DeliveryAssignment {
        method: method.clone(),
        courier_name: courier_name.clone(),
        charge,
        assigned_by: actor.to_string(),
        assigned_at: Utc::now(),
    };

    match method {
        DeliveryMethod::Manual | DeliveryMethod::CarrierProfile { .. } => {
            // The shipment insert doubles as the uniqueness check; the order
            // mirror is only written once it succeeds, so a rejected
            // reassignment leaves the order exactly as it was.
            let shipment = state.shipments.create(build_shipment(
                &order,
                method,
                courier_name,
                charge,
                None,
                None,
                None,
            ))?;
            record_assignment(state, order_id, assignment)?;
            state.metrics.shipments_created_total.inc();
            info!(order_id = %order_id, shipment_id = %shipment.id, "shipment created");

            Ok(AssignmentOutcome {
                order: refreshed_order(state, order_id)?,
                waybill: None,
                shipment: Some(shipment),
                degraded: false,
                message: "delivery method assigned".to_string(),
            })
        }
        DeliveryMethod::ExternalAggregator { courier_id } => {
            assign_via_aggregator(state, order, courier_id, courier_name, charge, assignment).await
        }
    }
}

fn record_assignment(
    state: &AppState,
    order_id: Uuid,
    assignment: DeliveryAssignment,
) -> Result<(), AppError> {
    let mut entry = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    entry.delivery = Some(assignment);
    Ok(())
}

async fn validate_method(
    state: &Arc<AppState>,
    order: &Order,
    method: &DeliveryMethod,
    ctx: OrderContext,
) -> Result<(f64, Option<String>), AppError> {
    let address = &order.shipping_address;

    match method {
        DeliveryMethod::Manual => {
            let free =
                state.manual_free_threshold > 0.0 && ctx.order_value >= state.manual_free_threshold;
            let charge = if free { 0.0 } else { state.manual_charge };
            Ok((charge, Some("Store Delivery".to_string())))
        }
        DeliveryMethod::CarrierProfile { profile_id } => {
            let profile = state.carriers.get(*profile_id).ok_or_else(|| {
                AppError::NotFound(format!("carrier profile {profile_id} not found"))
            })?;

            if !profile.active
                || !profile.approved
                || !profile.serves(&address.state, &address.city, &address.postal_code)
            {
                return Err(AppError::BadRequest(format!(
                    "carrier {} no longer serves {} {}",
                    profile.name, address.city, address.postal_code
                )));
            }
            if !profile_can_carry(&profile, ctx) {
                return Err(AppError::BadRequest(format!(
                    "carrier {} cannot carry this order",
                    profile.name
                )));
            }

            let charge =
                calculate_charge(&profile, ctx.weight_kg, None, ctx.cod_amount, ctx.order_value);
            Ok((charge, Some(profile.name)))
        }
        DeliveryMethod::ExternalAggregator { courier_id } => {
            match state
                .gateway
                .check_serviceability(
                    &state.pickup_postal_code,
                    &address.postal_code,
                    ctx.weight_kg,
                    ctx.cod_amount > 0.0,
                )
                .await
            {
                Ok(response) => {
                    state.metrics.observe_gateway("serviceability", true);
                    let quote = response
                        .couriers
                        .iter()
                        .find(|quote| quote.courier_company_id == *courier_id);
                    match quote {
                        Some(quote) if response.serviceable => {
                            Ok((quote.rate, Some(quote.courier_name.clone())))
                        }
                        _ => Err(AppError::BadRequest(format!(
                            "courier {courier_id} no longer serves {}",
                            address.postal_code
                        ))),
                    }
                }
                Err(err) => {
                    // Cannot disprove the offer while the gateway is down;
                    // record the choice and let shipment creation retry.
                    state.metrics.observe_gateway("serviceability", false);
                    warn!(error = %err, "serviceability re-check failed during assignment");
                    Ok((0.0, None))
                }
            }
        }
    }
}

async fn assign_via_aggregator(
    state: &Arc<AppState>,
    order: Order,
    courier_id: i64,
    courier_name: Option<String>,
    charge: f64,
    assignment: DeliveryAssignment,
) -> Result<AssignmentOutcome, AppError> {
    let order_id = order.id;
    let actor = assignment.assigned_by.clone();

    // A previous attempt may have created the shipment and then failed at
    // waybill generation; resume from there instead of re-creating. Only a
    // resumable attempt gets the method recorded on the order, so a rejected
    // duplicate leaves the order untouched.
    let existing = state.shipments.get(order_id);
    if let Some(shipment) = &existing {
        if shipment.awb.is_some() {
            return Err(AppError::Conflict(format!(
                "shipment already exists for order {order_id}"
            )));
        }
    }
    record_assignment(state, order_id, assignment)?;

    let shipment = match existing {
        Some(shipment) => shipment,
        None => {
            let created = match state.gateway.create_order(gateway_payload(&order, state)).await {
                Ok(created) => {
                    state.metrics.observe_gateway("create_order", true);
                    created
                }
                Err(err) => {
                    state.metrics.observe_gateway("create_order", false);
                    warn!(order_id = %order_id, error = %err, "aggregator order creation failed");
                    return Ok(AssignmentOutcome {
                        order: refreshed_order(state, order_id)?,
                        shipment: None,
                        waybill: None,
                        degraded: true,
                        message: format!(
                            "delivery method recorded by {actor}; shipment creation failed and can be retried: {err}"
                        ),
                    });
                }
            };

            let shipment = state.shipments.create(build_shipment(
                &order,
                DeliveryMethod::ExternalAggregator { courier_id },
                courier_name.clone(),
                charge,
                Some(created.order_id),
                Some(created.shipment_id),
                None,
            ))?;
            state.metrics.shipments_created_total.inc();
            shipment
        }
    };

    let aggregator_shipment_id = shipment.aggregator_shipment_id.ok_or_else(|| {
        AppError::Internal(format!(
            "aggregator shipment for order {order_id} has no shipment id"
        ))
    })?;

    match state
        .gateway
        .generate_waybill(aggregator_shipment_id, courier_id)
        .await
    {
        Ok(assignment) => {
            state.metrics.observe_gateway("generate_waybill", true);
            let updated = state.shipments.set_waybill(
                order_id,
                assignment.awb_code.clone(),
                Some(assignment.courier_name.clone()),
            )?;
            info!(order_id = %order_id, awb = %assignment.awb_code, "waybill assigned");

            Ok(AssignmentOutcome {
                order: refreshed_order(state, order_id)?,
                waybill: Some(assignment.awb_code),
                shipment: Some(updated),
                degraded: false,
                message: "delivery method assigned".to_string(),
            })
        }
        Err(err) => {
            state.metrics.observe_gateway("generate_waybill", false);
            warn!(order_id = %order_id, error = %err, "waybill generation failed");
            Ok(AssignmentOutcome {
                order: refreshed_order(state, order_id)?,
                waybill: None,
                shipment: Some(shipment),
                degraded: true,
                message: format!("shipment created; waybill generation can be retried: {err}"),
            })
        }
    }
}

fn refreshed_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

fn estimate_weight(order: &Order) -> f64 {
    let units: u32 = order.items.iter().map(|item| item.units).sum();
    (units.max(1) as f64 * 0.5).max(0.5)
}

fn build_shipment(
    order: &Order,
    method: DeliveryMethod,
    courier_name: Option<String>,
    charge: f64,
    aggregator_order_id: Option<i64>,
    aggregator_shipment_id: Option<i64>,
    awb: Option<String>,
) -> Shipment {
    let cod = order.cod_amount();
    Shipment {
        id: Uuid::new_v4(),
        order_id: order.id,
        order_number: order.order_number.clone(),
        method,
        aggregator_order_id,
        aggregator_shipment_id,
        awb,
        status: ShipmentStatus::Processing,
        courier_name,
        shipping_address: order.shipping_address.clone(),
        pickup_address: None,
        items: order.items.clone(),
        package: PackageDetails {
            weight_kg: estimate_weight(order),
            ..PackageDetails::default()
        },
        charges: ChargeBreakdown {
            freight: charge,
            cod,
            surcharges: 0.0,
            total: charge,
        },
        payment_mode: order.payment_mode,
        total_value: order.total,
        delivery_attempts: 0,
        rto_reason: None,
        cancellation_reason: None,
        actual_delivery_date: None,
        last_status_update: Utc::now(),
        created_at: Utc::now(),
    }
}

fn gateway_payload(order: &Order, state: &AppState) -> GatewayCreateOrder {
    let address = &order.shipping_address;
    GatewayCreateOrder {
        order_id: order.order_number.clone(),
        order_date: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        pickup_location: state.pickup_location_name.clone(),
        billing_customer_name: address.name.clone(),
        billing_address: address.line1.clone(),
        billing_city: address.city.clone(),
        billing_state: address.state.clone(),
        billing_pincode: address.postal_code.clone(),
        billing_country: address.country.clone(),
        billing_phone: address.phone.clone(),
        shipping_is_billing: true,
        order_items: order
            .items
            .iter()
            .map(|item| GatewayOrderItem {
                name: item.name.clone(),
                sku: item.sku.clone(),
                units: item.units,
                selling_price: item.unit_price,
                discount: item.discount,
                tax: item.tax,
            })
            .collect(),
        payment_method: match order.payment_mode {
            PaymentMode::Cod => "COD".to_string(),
            PaymentMode::Prepaid => "Prepaid".to_string(),
        },
        sub_total: order.subtotal,
        length: 10.0,
        breadth: 10.0,
        height: 10.0,
        weight: estimate_weight(order),
    }
}
