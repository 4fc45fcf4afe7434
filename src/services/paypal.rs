// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PayPal Orders v2 client.
//!
//! Handles:
//! - OAuth client-credentials token, cached until shortly before expiry
//! - Order creation for a plan
//! - Order capture

use crate::config::PaypalConfig;
use crate::error::AppError;
use crate::models::{Currency, Plan};
use crate::services::http::{check_response_json, provider_client};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

const PROVIDER: &str = "PayPal";

/// Margin before token expiration when we fetch a new one (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// A created PayPal order.
#[derive(Debug, Clone, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
}

/// Result of capturing an order.
#[derive(Debug, Clone, Deserialize)]
pub struct PaypalCapture {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub payer: Option<PaypalPayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalPayer {
    pub payer_id: Option<String>,
}

impl PaypalCapture {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// PayPal REST client. Clones share the token cache.
#[derive(Clone)]
pub struct PaypalClient {
    http: reqwest::Client,
    config: PaypalConfig,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl PaypalClient {
    pub fn new(config: PaypalConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: provider_client()?,
            config,
            token: Arc::new(Mutex::new(None)),
        })
    }

    fn credentials(&self) -> Result<(&str, &str), AppError> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AppError::NotConfigured("PayPal")),
        }
    }

    /// Get a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    async fn access_token(&self) -> Result<String, AppError> {
        let (client_id, client_secret) = self.credentials()?;
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // Holding the lock across the fetch keeps concurrent callers from
        // requesting duplicate tokens.
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if now + margin < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Token request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(PROVIDER, response).await?;
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + Duration::seconds(token.expires_in),
        });

        tracing::debug!(expires_in = token.expires_in, "PayPal access token refreshed");
        Ok(token.access_token)
    }

    /// Create a capture-intent order for `plan`, charged in USD.
    pub async fn create_order(&self, uid: &str, plan: Plan) -> Result<PaypalOrder, AppError> {
        let token = self.access_token().await?;
        let currency = Currency::Usd;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": plan.id(),
                "custom_id": uid,
                "description": plan.display_name(),
                "amount": {
                    "currency_code": currency.code(),
                    "value": currency.format_major(plan.price_minor(currency)),
                }
            }]
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, e.to_string()))?;

        let order: PaypalOrder = check_response_json(PROVIDER, response).await?;
        tracing::info!(uid, plan = %plan, order_id = %order.id, "PayPal order created");
        Ok(order)
    }

    /// Capture an approved order.
    pub async fn capture_order(&self, order_id: &str) -> Result<PaypalCapture, AppError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.config.api_base,
                urlencoding::encode(order_id)
            ))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, e.to_string()))?;

        if response.status().as_u16() == 422 {
            // Declined instrument or order not approved by the buyer.
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(order_id, body = %body, "PayPal capture rejected");
            return Err(AppError::PaymentFailed(
                "PayPal could not capture this order".to_string(),
            ));
        }

        check_response_json(PROVIDER, response).await
    }
}
