// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay orders API client and webhook payload parsing.

use crate::config::RazorpayConfig;
use crate::error::AppError;
use crate::models::{Currency, Plan};
use crate::services::http::{check_response_json, provider_client};
use crate::services::subscription::json_str;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "Razorpay";
const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    config: RazorpayConfig,
}

/// Order as returned by `POST /v1/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: u64,
    currency: &'a str,
    receipt: String,
    notes: OrderNotes<'a>,
}

#[derive(Serialize)]
struct OrderNotes<'a> {
    uid: &'a str,
    plan: &'a str,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: provider_client()?,
            base_url: RAZORPAY_API_BASE.to_string(),
            config,
        })
    }

    /// Public key ID handed to Razorpay Checkout in the browser.
    pub fn key_id(&self) -> Result<&str, AppError> {
        self.config
            .key_id
            .as_deref()
            .ok_or(AppError::NotConfigured("Razorpay"))
    }

    /// Secret used to verify checkout signatures.
    pub fn key_secret(&self) -> Result<&str, AppError> {
        self.config
            .key_secret
            .as_deref()
            .ok_or(AppError::NotConfigured("Razorpay"))
    }

    /// Secret used to verify webhook deliveries.
    pub fn webhook_secret(&self) -> Result<&str, AppError> {
        self.config
            .webhook_secret
            .as_deref()
            .ok_or(AppError::NotConfigured("Razorpay webhooks"))
    }

    /// Create an order for `plan`, charged in INR.
    pub async fn create_order(&self, uid: &str, plan: Plan) -> Result<RazorpayOrder, AppError> {
        let key_id = self.key_id()?;
        let key_secret = self.key_secret()?;
        let currency = Currency::Inr;

        let request = CreateOrderRequest {
            amount: plan.price_minor(currency),
            currency: currency.code(),
            // 37 characters; Razorpay caps receipts at 40.
            receipt: format!("rcpt_{}", uuid::Uuid::new_v4().simple()),
            notes: OrderNotes {
                uid,
                plan: plan.id(),
            },
        };

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(key_id, Some(key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, e.to_string()))?;

        let order: RazorpayOrder = check_response_json(PROVIDER, response).await?;
        tracing::info!(uid, plan = %plan, order_id = %order.id, "Razorpay order created");
        Ok(order)
    }
}

/// A captured payment extracted from a webhook delivery.
///
/// `uid` and `plan` come from the order notes when Razorpay echoes them;
/// otherwise the mirrored order record supplies them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
    pub order_id: String,
    pub payment_id: String,
    pub uid: Option<String>,
    pub plan: Option<String>,
}

/// Extract the captured payment from a `payment.captured` or `order.paid`
/// webhook. `Ok(None)` for every other event.
pub fn parse_webhook(payload: &serde_json::Value) -> Result<Option<CapturedPayment>, AppError> {
    let event = json_str(payload, &["event"]).unwrap_or_default();
    if event != "payment.captured" && event != "order.paid" {
        return Ok(None);
    }

    let payment = payload
        .get("payload")
        .and_then(|p| p.get("payment"))
        .and_then(|p| p.get("entity"))
        .ok_or_else(|| AppError::BadRequest(format!("{} without payment entity", event)))?;

    let payment_id = json_str(payment, &["id"])
        .ok_or_else(|| AppError::BadRequest("payment entity without id".to_string()))?;
    let order_id = json_str(payment, &["order_id"])
        .or_else(|| json_str(payload, &["payload", "order", "entity", "id"]))
        .ok_or_else(|| AppError::BadRequest("payment entity without order_id".to_string()))?;

    Ok(Some(CapturedPayment {
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
        uid: json_str(payment, &["notes", "uid"]).map(str::to_string),
        plan: json_str(payment, &["notes", "plan"]).map(str::to_string),
    }))
}
