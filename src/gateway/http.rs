use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    CarrierGateway, DocumentUrl, GatewayCreateOrder, GatewayError, GatewayOrderCreated,
    GatewayResult, PickupScheduled, ServiceabilityResponse, TrackingSnapshot, WaybillAssignment,
};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub timeout: Duration,
    /// Tokens are treated as expired this long before their declared TTL.
    pub token_safety_margin: Duration,
}

#[derive(Debug, Clone)]
struct SessionToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Aggregator client over reqwest. Bounded timeouts, cached session token,
/// transparent re-auth on expiry and one retry on 401.
pub struct HttpCarrierGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    token: Mutex<Option<SessionToken>>,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    #[serde(default = "default_ttl_secs")]
    expires_in: u64,
}

fn default_ttl_secs() -> u64 {
    // The aggregator documents 10-day tokens; assume that when omitted.
    10 * 24 * 3600
}

impl HttpCarrierGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::Network(format!("client build failed: {err}")))?;

        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    async fn authenticate(&self) -> GatewayResult<String> {
        let url = format!("{}/auth/login", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "email": self.config.email,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "login returned {}",
                response.status()
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;

        let ttl = Duration::from_secs(auth.expires_in)
            .saturating_sub(self.config.token_safety_margin);
        let token = SessionToken {
            value: auth.token,
            expires_at: Utc::now()
                + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero()),
        };

        debug!(expires_at = %token.expires_at, "gateway session token refreshed");

        let value = token.value.clone();
        *self.token.lock().await = Some(token);
        Ok(value)
    }

    async fn valid_token(&self) -> GatewayResult<String> {
        {
            let guard = self.token.lock().await;
            if let Some(token) = guard.as_ref() {
                if token.is_valid() {
                    return Ok(token.value.clone());
                }
            }
        }
        self.authenticate().await
    }

    /// Sends an authenticated request; re-authenticates and retries once when
    /// the aggregator answers 401 with a token we believed valid.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> GatewayResult<T> {
        let mut token = self.valid_token().await?;

        for attempt in 0..2 {
            let url = format!("{}{path}", self.config.base_url);
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token);
            if let Some(ref payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(map_transport_error)?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!(path, "gateway rejected session token; re-authenticating");
                token = self.authenticate().await?;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return response
                .json::<T>()
                .await
                .map_err(|err| GatewayError::Decode(err.to_string()));
        }

        Err(GatewayError::Auth("re-authentication did not help".to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}

#[async_trait]
impl CarrierGateway for HttpCarrierGateway {
    async fn create_order(&self, order: GatewayCreateOrder) -> GatewayResult<GatewayOrderCreated> {
        self.call(
            reqwest::Method::POST,
            "/orders/create/adhoc",
            Some(serde_json::to_value(&order).map_err(|err| GatewayError::Decode(err.to_string()))?),
        )
        .await
    }

    async fn check_serviceability(
        &self,
        pickup_postal_code: &str,
        delivery_postal_code: &str,
        weight_kg: f64,
        cod: bool,
    ) -> GatewayResult<ServiceabilityResponse> {
        let path = format!(
            "/courier/serviceability?pickup_postcode={pickup_postal_code}&delivery_postcode={delivery_postal_code}&weight={weight_kg}&cod={}",
            u8::from(cod)
        );
        self.call(reqwest::Method::GET, &path, None).await
    }

    async fn generate_waybill(
        &self,
        shipment_id: i64,
        courier_id: i64,
    ) -> GatewayResult<WaybillAssignment> {
        self.call(
            reqwest::Method::POST,
            "/courier/assign/awb",
            Some(json!({ "shipment_id": shipment_id, "courier_id": courier_id })),
        )
        .await
    }

    async fn track_by_waybill(&self, awb: &str) -> GatewayResult<TrackingSnapshot> {
        let path = format!("/courier/track/awb/{awb}");
        self.call(reqwest::Method::GET, &path, None).await
    }

    async fn cancel(&self, awbs: &[String]) -> GatewayResult<()> {
        let _: serde_json::Value = self
            .call(
                reqwest::Method::POST,
                "/orders/cancel/shipment/awbs",
                Some(json!({ "awbs": awbs })),
            )
            .await?;
        Ok(())
    }

    async fn generate_pickup(
        &self,
        shipment_ids: &[i64],
        date: NaiveDate,
    ) -> GatewayResult<PickupScheduled> {
        self.call(
            reqwest::Method::POST,
            "/courier/generate/pickup",
            Some(json!({
                "shipment_id": shipment_ids,
                "pickup_date": date.to_string(),
            })),
        )
        .await
    }

    async fn generate_manifest(&self, shipment_ids: &[i64]) -> GatewayResult<DocumentUrl> {
        self.call(
            reqwest::Method::POST,
            "/manifests/generate",
            Some(json!({ "shipment_id": shipment_ids })),
        )
        .await
    }

    async fn generate_label(&self, shipment_ids: &[i64]) -> GatewayResult<DocumentUrl> {
        self.call(
            reqwest::Method::POST,
            "/courier/generate/label",
            Some(json!({ "shipment_id": shipment_ids })),
        )
        .await
    }

    async fn generate_invoice(&self, order_ids: &[i64]) -> GatewayResult<DocumentUrl> {
        self.call(
            reqwest::Method::POST,
            "/orders/print/invoice",
            Some(json!({ "ids": order_ids })),
        )
        .await
    }
}
