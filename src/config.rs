use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::gateway::http::GatewayConfig;
use crate::resolver::DeliveryMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub delivery_mode: DeliveryMode,
    /// HMAC secret for carrier webhooks; unset disables verification.
    pub carrier_webhook_secret: Option<String>,
    pub pickup_postal_code: String,
    pub pickup_location_name: String,
    pub manual_charge: f64,
    pub manual_free_threshold: f64,
    pub manual_eta_days: u32,
    pub gateway_base_url: String,
    pub gateway_email: String,
    pub gateway_password: String,
    pub gateway_timeout_secs: u64,
    pub gateway_token_margin_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let delivery_mode = env::var("DELIVERY_MODE")
            .unwrap_or_else(|_| "manual".to_string())
            .parse::<DeliveryMode>()
            .map_err(AppError::Internal)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            delivery_mode,
            carrier_webhook_secret: env::var("CARRIER_WEBHOOK_SECRET").ok(),
            pickup_postal_code: env::var("PICKUP_POSTAL_CODE")
                .unwrap_or_else(|_| "560001".to_string()),
            pickup_location_name: env::var("PICKUP_LOCATION_NAME")
                .unwrap_or_else(|_| "Primary".to_string()),
            manual_charge: parse_or_default("MANUAL_DELIVERY_CHARGE", 50.0)?,
            manual_free_threshold: parse_or_default("MANUAL_FREE_THRESHOLD", 0.0)?,
            manual_eta_days: parse_or_default("MANUAL_ETA_DAYS", 5)?,
            gateway_base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://apiv2.shiprocket.in/v1/external".to_string()),
            gateway_email: env::var("GATEWAY_EMAIL").unwrap_or_default(),
            gateway_password: env::var("GATEWAY_PASSWORD").unwrap_or_default(),
            gateway_timeout_secs: parse_or_default("GATEWAY_TIMEOUT_SECS", 15)?,
            gateway_token_margin_secs: parse_or_default("GATEWAY_TOKEN_MARGIN_SECS", 600)?,
        })
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_base_url.clone(),
            email: self.gateway_email.clone(),
            password: self.gateway_password.clone(),
            timeout: Duration::from_secs(self.gateway_timeout_secs),
            token_safety_margin: Duration::from_secs(self.gateway_token_margin_secs),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
