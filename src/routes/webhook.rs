// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for payment provider events.
//!
//! Every receiver verifies the signature over the raw body before parsing
//! it. A bad signature is terminal (400, no write); an event we don't act on
//! is acknowledged with 200 so the provider stops retrying.

use crate::error::{AppError, Result};
use crate::models::{PaymentProvider, ProviderIds};
use crate::services::paddle;
use crate::services::razorpay::{self, CapturedPayment};
use crate::services::signature::{self, SignatureError};
use crate::services::stripe::{self, StripeEvent};
use crate::services::subscription::{parse_plan, SubscriptionUpdate};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/webhooks/razorpay", post(razorpay_webhook))
        .route("/webhooks/paddle", post(paddle_webhook))
}

/// Acknowledgement body returned to providers.
#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
    /// Whether the event changed a subscription
    pub applied: bool,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)
}

fn reject(provider: PaymentProvider, err: SignatureError) -> AppError {
    tracing::warn!(
        provider = provider.name(),
        error = %err,
        "Security Alert: webhook signature verification failed"
    );
    AppError::InvalidSignature
}

fn parse_body<T: serde::de::DeserializeOwned>(provider: PaymentProvider, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(provider = provider.name(), error = %e, "Unparseable webhook body");
        AppError::BadRequest(format!("invalid {} payload", provider.name()))
    })
}

/// Hand a normalized update to the subscription writer.
async fn apply(
    state: &AppState,
    provider: PaymentProvider,
    update: Option<(String, SubscriptionUpdate)>,
) -> Result<Json<WebhookAck>> {
    let Some((uid, update)) = update else {
        return Ok(Json(WebhookAck {
            received: true,
            applied: false,
        }));
    };

    let written = state
        .subscriptions
        .apply(&uid, update, Utc::now())
        .await
        .map_err(|e| {
            tracing::error!(
                provider = provider.name(),
                uid = %uid,
                error = %e,
                "Subscription write failed"
            );
            e
        })?;

    Ok(Json(WebhookAck {
        received: true,
        applied: written.is_some(),
    }))
}

/// Stripe event receiver.
async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or(AppError::NotConfigured("Stripe webhooks"))?;

    let signature = header(&headers, "stripe-signature")?;
    signature::verify_stripe(secret, &body, signature, Utc::now().timestamp())
        .map_err(|e| reject(PaymentProvider::Stripe, e))?;

    let event: StripeEvent = parse_body(PaymentProvider::Stripe, &body)?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe event received");

    let update = stripe::normalize_event(&event)?;
    apply(&state, PaymentProvider::Stripe, update).await
}

/// Razorpay webhook receiver.
async fn razorpay_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let secret = state.razorpay.webhook_secret()?;

    let signature = header(&headers, "x-razorpay-signature")?;
    signature::verify_razorpay_webhook(secret, &body, signature)
        .map_err(|e| reject(PaymentProvider::Razorpay, e))?;

    let payload: serde_json::Value = parse_body(PaymentProvider::Razorpay, &body)?;
    tracing::info!(
        event = payload.get("event").and_then(|e| e.as_str()).unwrap_or("unknown"),
        "Razorpay event received"
    );

    let update = match razorpay::parse_webhook(&payload)? {
        Some(captured) => Some(resolve_razorpay_payment(&state, captured).await?),
        None => None,
    };
    apply(&state, PaymentProvider::Razorpay, update).await
}

/// Attribute a captured Razorpay payment to a user and plan.
///
/// Order notes are used when present; otherwise the order record written at
/// checkout supplies them.
async fn resolve_razorpay_payment(
    state: &AppState,
    captured: CapturedPayment,
) -> Result<(String, SubscriptionUpdate)> {
    let (uid, plan) = match (captured.uid, captured.plan) {
        (Some(uid), Some(plan)) => (uid, parse_plan(Some(plan.as_str()))?),
        _ => {
            let order = state
                .store
                .get_order(&captured.order_id)
                .await?
                .ok_or_else(|| {
                    tracing::warn!(order_id = %captured.order_id, "Captured payment for unknown order");
                    AppError::BadRequest(format!("unknown order {}", captured.order_id))
                })?;
            (order.uid, order.plan)
        }
    };

    let provider_ids = ProviderIds {
        order_id: Some(captured.order_id),
        payment_id: Some(captured.payment_id),
        ..ProviderIds::default()
    };

    Ok((
        uid,
        SubscriptionUpdate::activate(plan, PaymentProvider::Razorpay, provider_ids),
    ))
}

/// Paddle notification receiver.
async fn paddle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let secret = state
        .config
        .paddle_webhook_secret
        .as_deref()
        .ok_or(AppError::NotConfigured("Paddle webhooks"))?;

    let signature = header(&headers, "paddle-signature")?;
    signature::verify_paddle(secret, &body, signature, Utc::now().timestamp())
        .map_err(|e| reject(PaymentProvider::Paddle, e))?;

    let payload: serde_json::Value = parse_body(PaymentProvider::Paddle, &body)?;
    tracing::info!(
        event_type = payload
            .get("event_type")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown"),
        "Paddle event received"
    );

    let update = paddle::normalize_event(&payload)?;
    apply(&state, PaymentProvider::Paddle, update).await
}
