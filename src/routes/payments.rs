// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout routes: order creation and client-side payment verification.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Currency, Order, PaymentProvider, Plan, ProviderIds, Subscription};
use crate::routes::api::SubscriptionView;
use crate::services::signature;
use crate::services::SubscriptionUpdate;
use crate::AppState;
use axum::{
    extract::{Form, State},
    response::Redirect,
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Verification routes called by the browser after Razorpay Checkout.
/// Authenticity comes from the payment signature, not a user session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/razorpay/verify", post(verify_razorpay))
        .route("/payments/razorpay/callback", post(razorpay_callback))
}

/// Checkout initiation routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payments/razorpay/order", post(create_razorpay_order))
        .route("/api/payments/stripe/checkout", post(create_stripe_checkout))
        .route("/api/payments/paypal/order", post(create_paypal_order))
        .route("/api/payments/paypal/capture", post(capture_paypal_order))
}

/// A plan chosen on the pricing page.
#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub plan: Plan,
}

// ─── Razorpay ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RazorpayOrderResponse {
    pub order_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: u64,
    pub currency: String,
    /// Public key for Razorpay Checkout
    pub key_id: String,
}

async fn create_razorpay_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<RazorpayOrderResponse>> {
    let key_id = state.razorpay.key_id()?.to_string();
    let order = state.razorpay.create_order(&user.uid, req.plan).await?;

    state
        .store
        .create_order(&Order {
            order_id: order.id.clone(),
            uid: user.uid.clone(),
            plan: req.plan,
            provider: PaymentProvider::Razorpay,
            amount_minor: order.amount,
            currency: Currency::Inr,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(RazorpayOrderResponse {
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id,
    }))
}

/// Fields Razorpay Checkout hands back on success.
#[derive(Debug, Deserialize)]
pub struct RazorpayPayment {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub subscription: SubscriptionView,
}

/// Verify a checkout signature and activate the ordered plan.
async fn settle_razorpay_payment(
    state: &AppState,
    payment: &RazorpayPayment,
) -> Result<Option<Subscription>> {
    let key_secret = state.razorpay.key_secret()?;

    signature::verify_razorpay_payment(
        key_secret,
        &payment.razorpay_order_id,
        &payment.razorpay_payment_id,
        &payment.razorpay_signature,
    )
    .map_err(|e| {
        tracing::warn!(
            order_id = %payment.razorpay_order_id,
            error = %e,
            "Security Alert: Razorpay payment signature verification failed"
        );
        AppError::InvalidSignature
    })?;

    let order = state
        .store
        .get_order(&payment.razorpay_order_id)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(format!("unknown order {}", payment.razorpay_order_id))
        })?;

    let provider_ids = ProviderIds {
        order_id: Some(payment.razorpay_order_id.clone()),
        payment_id: Some(payment.razorpay_payment_id.clone()),
        ..ProviderIds::default()
    };

    state
        .subscriptions
        .apply(
            &order.uid,
            SubscriptionUpdate::activate(order.plan, PaymentProvider::Razorpay, provider_ids),
            Utc::now(),
        )
        .await
}

/// JSON verification, called by the frontend's Checkout handler.
async fn verify_razorpay(
    State(state): State<Arc<AppState>>,
    Json(payment): Json<RazorpayPayment>,
) -> Result<Json<VerifyResponse>> {
    let subscription = settle_razorpay_payment(&state, &payment).await?;

    Ok(Json(VerifyResponse {
        success: true,
        subscription: SubscriptionView::new(subscription.as_ref(), Utc::now()),
    }))
}

/// Razorpay's legacy form post. A successful payment carries the
/// verification triple; a failed one carries only `error[...]` fields.
#[derive(Debug, Deserialize)]
pub struct RazorpayCallbackForm {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    #[serde(rename = "error[code]")]
    pub error_code: Option<String>,
    #[serde(rename = "error[description]")]
    pub error_description: Option<String>,
}

impl RazorpayCallbackForm {
    fn payment(self) -> Option<RazorpayPayment> {
        Some(RazorpayPayment {
            razorpay_order_id: self.razorpay_order_id?,
            razorpay_payment_id: self.razorpay_payment_id?,
            razorpay_signature: self.razorpay_signature?,
        })
    }
}

/// Legacy form-post callback. Always redirects back to the frontend.
async fn razorpay_callback(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RazorpayCallbackForm>,
) -> Redirect {
    let frontend = &state.config.frontend_url;
    let failed = |reason: &str| Redirect::to(&format!("{}/payment/failed?reason={}", frontend, reason));

    let error_code = form.error_code.clone();
    let error_description = form.error_description.clone();
    let Some(payment) = form.payment() else {
        tracing::warn!(
            error_code = error_code.as_deref().unwrap_or("none"),
            error_description = error_description.as_deref().unwrap_or(""),
            "Razorpay callback without a completed payment"
        );
        return failed("payment_failed");
    };

    match settle_razorpay_payment(&state, &payment).await {
        Ok(subscription) => {
            let plan = subscription.map(|s| s.plan.id()).unwrap_or_default();
            Redirect::to(&format!("{}/payment/success?plan={}", frontend, plan))
        }
        Err(e) => {
            let reason = match &e {
                AppError::InvalidSignature => "invalid_signature",
                AppError::BadRequest(_) => "unknown_order",
                _ => "server_error",
            };
            tracing::warn!(
                order_id = %payment.razorpay_order_id,
                error = %e,
                "Razorpay callback failed"
            );
            failed(reason)
        }
    }
}

// ─── Stripe ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

async fn create_stripe_checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let frontend = &state.config.frontend_url;
    let success_url = format!(
        "{}/payment/success?plan={}&session_id={{CHECKOUT_SESSION_ID}}",
        frontend,
        req.plan.id()
    );
    let cancel_url = format!("{}/pricing", frontend);

    let session = state
        .stripe
        .create_checkout_session(
            &user.uid,
            user.email.as_deref(),
            req.plan,
            &success_url,
            &cancel_url,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

// ─── PayPal ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PaypalOrderResponse {
    pub order_id: String,
    pub status: String,
}

async fn create_paypal_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<PaypalOrderResponse>> {
    let order = state.paypal.create_order(&user.uid, req.plan).await?;

    state
        .store
        .create_order(&Order {
            order_id: order.id.clone(),
            uid: user.uid.clone(),
            plan: req.plan,
            provider: PaymentProvider::Paypal,
            amount_minor: req.plan.price_minor(Currency::Usd),
            currency: Currency::Usd,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(PaypalOrderResponse {
        order_id: order.id,
        status: order.status,
    }))
}

#[derive(Deserialize)]
pub struct CaptureRequest {
    pub order_id: String,
}

/// Capture an approved PayPal order and activate its plan.
async fn capture_paypal_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<SubscriptionView>> {
    let order = state
        .store
        .get_order(&req.order_id)
        .await?
        .filter(|o| o.provider == PaymentProvider::Paypal)
        .ok_or_else(|| AppError::NotFound(format!("order {}", req.order_id)))?;

    if order.uid != user.uid {
        tracing::warn!(
            uid = %user.uid,
            order_id = %req.order_id,
            "Security Alert: capture attempted for another user's order"
        );
        return Err(AppError::Forbidden("order belongs to another user".to_string()));
    }

    let capture = state.paypal.capture_order(&order.order_id).await?;
    if !capture.is_completed() {
        tracing::warn!(order_id = %order.order_id, status = %capture.status, "PayPal capture not completed");
        return Err(AppError::PaymentFailed(format!(
            "capture status {}",
            capture.status
        )));
    }

    let provider_ids = ProviderIds {
        customer_id: capture.payer.and_then(|p| p.payer_id),
        order_id: Some(order.order_id.clone()),
        ..ProviderIds::default()
    };

    let now = Utc::now();
    let subscription = state
        .subscriptions
        .apply(
            &user.uid,
            SubscriptionUpdate::activate(order.plan, PaymentProvider::Paypal, provider_ids),
            now,
        )
        .await?;

    Ok(Json(SubscriptionView::new(subscription.as_ref(), now)))
}
