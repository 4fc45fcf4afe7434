// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay Checkout verification: JSON route and legacy form callback.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use sage_api::models::{Currency, Order, PaymentProvider, Plan, SubscriptionStatus};
use sage_api::AppState;
use serde_json::json;
use tower::ServiceExt;

mod common;

const KEY_SECRET: &str = "rzp_test_secret";

async fn seed_order(state: &AppState, order_id: &str, uid: &str, plan: Plan) {
    state
        .store
        .create_order(&Order {
            order_id: order_id.to_string(),
            uid: uid.to_string(),
            plan,
            provider: PaymentProvider::Razorpay,
            amount_minor: plan.price_minor(Currency::Inr),
            currency: Currency::Inr,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

fn verify_request(order_id: &str, payment_id: &str, signature: &str) -> Request<Body> {
    let body = json!({
        "razorpay_order_id": order_id,
        "razorpay_payment_id": payment_id,
        "razorpay_signature": signature,
    });

    Request::builder()
        .method("POST")
        .uri("/payments/razorpay/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn callback_request(order_id: &str, payment_id: &str, signature: &str) -> Request<Body> {
    let body = format!(
        "razorpay_order_id={}&razorpay_payment_id={}&razorpay_signature={}",
        order_id, payment_id, signature
    );

    Request::builder()
        .method("POST")
        .uri("/payments/razorpay/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_verify_valid_signature_activates_yearly() {
    let (app, state) = common::create_test_app();
    seed_order(&state, "order_Y1", "uid-yearly", Plan::SageModeYearly).await;
    let signature = common::razorpay_payment_signature(KEY_SECRET, "order_Y1", "pay_Y1");

    let response = app
        .oneshot(verify_request("order_Y1", "pay_Y1", &signature))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["subscription"]["active"], true);
    assert_eq!(json["subscription"]["plan"], "SAGE_MODE_YEARLY");
    assert_eq!(json["subscription"]["status"], "active");

    let subscription = state
        .store
        .get_user("uid-yearly")
        .await
        .unwrap()
        .unwrap()
        .subscription
        .unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        subscription.expires_at - subscription.started_at,
        Duration::days(365)
    );
    assert_eq!(subscription.provider_ids.order_id.as_deref(), Some("order_Y1"));
    assert_eq!(subscription.provider_ids.payment_id.as_deref(), Some("pay_Y1"));
}

#[tokio::test]
async fn test_verify_rejects_every_single_byte_mutation() {
    let (_, state) = common::create_test_app();
    seed_order(&state, "order_M1", "uid-mutate", Plan::SageModeMonthly).await;
    let signature = common::razorpay_payment_signature(KEY_SECRET, "order_M1", "pay_M1");

    for i in 0..signature.len() {
        let mut bytes = signature.clone().into_bytes();
        bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
        let mutated = String::from_utf8(bytes).unwrap();

        let app = sage_api::routes::create_router(state.clone());
        let response = app
            .oneshot(verify_request("order_M1", "pay_M1", &mutated))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "byte {}", i);
    }

    assert!(state.store.get_user("uid-mutate").await.unwrap().is_none());
}

#[tokio::test]
async fn test_verify_signature_for_other_payment_is_rejected() {
    let (app, state) = common::create_test_app();
    seed_order(&state, "order_S1", "uid-swap", Plan::SageModeMonthly).await;
    // Valid signature, but for a different payment ID
    let signature = common::razorpay_payment_signature(KEY_SECRET, "order_S1", "pay_other");

    let response = app
        .oneshot(verify_request("order_S1", "pay_S1", &signature))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "invalid_signature");
}

#[tokio::test]
async fn test_verify_unknown_order_is_bad_request() {
    let (app, _) = common::create_test_app();
    let signature = common::razorpay_payment_signature(KEY_SECRET, "order_none", "pay_1");

    let response = app
        .oneshot(verify_request("order_none", "pay_1", &signature))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_callback_success_redirects_to_success_page() {
    let (app, state) = common::create_test_app();
    seed_order(&state, "order_C1", "uid-callback", Plan::SageModeQuarterly).await;
    let signature = common::razorpay_payment_signature(KEY_SECRET, "order_C1", "pay_C1");

    let response = app
        .oneshot(callback_request("order_C1", "pay_C1", &signature))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:3000/payment/success?plan=SAGE_MODE_QUARTERLY"
    );

    let user = state.store.get_user("uid-callback").await.unwrap().unwrap();
    assert!(user.has_active_subscription(Utc::now()));
}

#[tokio::test]
async fn test_callback_bad_signature_redirects_to_failure_page() {
    let (app, state) = common::create_test_app();
    seed_order(&state, "order_C2", "uid-callback-bad", Plan::SageModeMonthly).await;

    let response = app
        .oneshot(callback_request("order_C2", "pay_C2", "0000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:3000/payment/failed?reason=invalid_signature"
    );
    assert!(state
        .store
        .get_user("uid-callback-bad")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_callback_payment_error_redirects_to_failure_page() {
    let (app, _) = common::create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/payments/razorpay/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "error%5Bcode%5D=BAD_REQUEST_ERROR&error%5Bdescription%5D=Payment+failed\
             &error%5Bmetadata%5D=%7B%22order_id%22%3A%22order_C3%22%7D",
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:3000/payment/failed?reason=payment_failed"
    );
}

#[tokio::test]
async fn test_callback_partial_payment_fields_redirects_to_failure_page() {
    let (app, _) = common::create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/payments/razorpay/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("razorpay_order_id=order_C4"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:3000/payment/failed?reason=payment_failed"
    );
}
