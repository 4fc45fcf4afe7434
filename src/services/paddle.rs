// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paddle Billing webhook normalization.
//!
//! Checkout runs in Paddle's overlay on the frontend, which passes
//! `custom_data: { uid, plan }` through to every notification.

use crate::error::AppError;
use crate::models::{PaymentProvider, ProviderIds, SubscriptionStatus};
use crate::services::subscription::{json_str, parse_plan, SubscriptionUpdate};

/// Map a verified Paddle notification to a subscription update.
///
/// `Ok(None)` means the event is not one we act on.
pub fn normalize_event(
    payload: &serde_json::Value,
) -> Result<Option<(String, SubscriptionUpdate)>, AppError> {
    let event_type = json_str(payload, &["event_type"]).unwrap_or_default();
    let data = payload
        .get("data")
        .unwrap_or(&serde_json::Value::Null);

    match event_type {
        "transaction.completed" => {
            let uid = json_str(data, &["custom_data", "uid"])
                .ok_or_else(|| AppError::BadRequest("transaction has no uid".to_string()))?;
            let plan = parse_plan(json_str(data, &["custom_data", "plan"]))?;

            let provider_ids = ProviderIds {
                customer_id: json_str(data, &["customer_id"]).map(str::to_string),
                subscription_id: json_str(data, &["subscription_id"]).map(str::to_string),
                order_id: json_str(data, &["id"]).map(str::to_string),
                payment_id: None,
            };

            Ok(Some((
                uid.to_string(),
                SubscriptionUpdate::activate(plan, PaymentProvider::Paddle, provider_ids),
            )))
        }
        "subscription.canceled" => Ok(json_str(data, &["custom_data", "uid"]).map(|uid| {
            (
                uid.to_string(),
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Paddle,
                    json_str(data, &["id"]),
                ),
            )
        })),
        "subscription.past_due" => Ok(json_str(data, &["custom_data", "uid"]).map(|uid| {
            (
                uid.to_string(),
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::PastDue,
                    PaymentProvider::Paddle,
                    json_str(data, &["id"]),
                ),
            )
        })),
        _ => Ok(None),
    }
}
