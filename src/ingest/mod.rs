use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::shipment::ShipmentStatus;

/// Maps a carrier-reported free-text status onto the canonical enum.
///
/// Case-insensitive. "rto", "delivered" and "return" match as substrings so
/// variants like "Delivered Successfully" or "RTO Delivered" classify; RTO is
/// checked first so "RTO Delivered" does not land on `Delivered`. Unknown
/// strings map to None; the caller still records the event.
pub fn normalize_carrier_status(raw: &str) -> Option<ShipmentStatus> {
    let status = raw.trim().to_ascii_lowercase();
    if status.is_empty() {
        return None;
    }

    if status.contains("rto") {
        return Some(if status.contains("delivered") {
            ShipmentStatus::RtoDelivered
        } else {
            ShipmentStatus::RtoInitiated
        });
    }
    if status.contains("delivered") {
        return Some(ShipmentStatus::Delivered);
    }
    if status.contains("return") {
        return Some(ShipmentStatus::Returned);
    }

    match status.as_str() {
        "pending" | "manifested" | "not picked" | "awb assigned" | "label generated" => {
            Some(ShipmentStatus::Pending)
        }
        "processing" | "pickup scheduled" | "pickup queued" => Some(ShipmentStatus::Processing),
        "shipped" | "picked up" | "pickup done" | "dispatched" => Some(ShipmentStatus::Shipped),
        "in transit" | "in_transit" | "reached at destination hub" => {
            Some(ShipmentStatus::InTransit)
        }
        "out for delivery" | "out_for_delivery" => Some(ShipmentStatus::OutForDelivery),
        "cancelled" | "canceled" | "cancelation requested" => Some(ShipmentStatus::Cancelled),
        "lost" => Some(ShipmentStatus::Lost),
        "damaged" => Some(ShipmentStatus::Damaged),
        "undelivered" | "delivery attempt failed" => Some(ShipmentStatus::OutForDelivery),
        _ => None,
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of the raw request body. Used for both signing test
/// payloads and verifying inbound carrier callbacks.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Constant-time verification via the hmac crate's own comparison.
pub fn verify_signature(secret: &str, body: &[u8], provided_hex: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);

    let Ok(provided) = decode_hex(provided_hex) else {
        return false;
    };
    mac.verify_slice(&provided).is_ok()
}

fn decode_hex(input: &str) -> Result<Vec<u8>, ()> {
    if input.len() % 2 != 0 {
        return Err(());
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{compute_signature, normalize_carrier_status, verify_signature};
    use crate::models::shipment::ShipmentStatus;

    #[test]
    fn exact_statuses_map_to_canonical() {
        assert_eq!(
            normalize_carrier_status("In Transit"),
            Some(ShipmentStatus::InTransit)
        );
        assert_eq!(
            normalize_carrier_status("OUT FOR DELIVERY"),
            Some(ShipmentStatus::OutForDelivery)
        );
        assert_eq!(
            normalize_carrier_status("picked up"),
            Some(ShipmentStatus::Shipped)
        );
        assert_eq!(
            normalize_carrier_status("Cancelled"),
            Some(ShipmentStatus::Cancelled)
        );
    }

    #[test]
    fn delivered_matches_as_substring() {
        assert_eq!(
            normalize_carrier_status("Delivered Successfully"),
            Some(ShipmentStatus::Delivered)
        );
        assert_eq!(
            normalize_carrier_status("Shipment Delivered To Consignee"),
            Some(ShipmentStatus::Delivered)
        );
    }

    #[test]
    fn rto_takes_precedence_over_delivered() {
        assert_eq!(
            normalize_carrier_status("RTO Delivered"),
            Some(ShipmentStatus::RtoDelivered)
        );
        assert_eq!(
            normalize_carrier_status("RTO Initiated"),
            Some(ShipmentStatus::RtoInitiated)
        );
        assert_eq!(
            normalize_carrier_status("rto in transit"),
            Some(ShipmentStatus::RtoInitiated)
        );
    }

    #[test]
    fn returned_matches_as_substring() {
        assert_eq!(
            normalize_carrier_status("Returned To Seller"),
            Some(ShipmentStatus::Returned)
        );
    }

    #[test]
    fn unknown_statuses_map_to_none() {
        assert_eq!(normalize_carrier_status("Weather Hold"), None);
        assert_eq!(normalize_carrier_status(""), None);
        assert_eq!(normalize_carrier_status("   "), None);
    }

    #[test]
    fn signature_round_trip_verifies() {
        let body = br#"{"awb":"AWB1","current_status":"Delivered"}"#;
        let signature = compute_signature("topsecret", body);

        assert!(verify_signature("topsecret", body, &signature));
        assert!(!verify_signature("othersecret", body, &signature));
        assert!(!verify_signature("topsecret", b"tampered", &signature));
        assert!(!verify_signature("topsecret", body, "zz-not-hex"));
    }
}
