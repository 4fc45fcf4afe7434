// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe Checkout sessions and webhook event normalization.

use crate::error::AppError;
use crate::models::{Currency, PaymentProvider, Plan, ProviderIds, SubscriptionStatus};
use crate::services::http::{check_response_json, provider_client};
use crate::services::subscription::{json_str, parse_plan, SubscriptionUpdate};
use serde::Deserialize;

const PROVIDER: &str = "Stripe";
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

/// A created Checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http: provider_client()?,
            base_url: STRIPE_API_BASE.to_string(),
            secret_key,
        })
    }

    fn secret_key(&self) -> Result<&str, AppError> {
        self.secret_key
            .as_deref()
            .ok_or(AppError::NotConfigured("Stripe"))
    }

    /// Create a one-time-payment Checkout session for `plan`.
    ///
    /// The uid and plan travel in `client_reference_id` and `metadata` so
    /// the webhook can map the completed session back to the user.
    pub async fn create_checkout_session(
        &self,
        uid: &str,
        email: Option<&str>,
        plan: Plan,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        let secret_key = self.secret_key()?;
        let currency = Currency::Usd;

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("client_reference_id", uid.to_string()),
            ("metadata[uid]", uid.to_string()),
            ("metadata[plan]", plan.id().to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                currency.code().to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                plan.price_minor(currency).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                plan.display_name().to_string(),
            ),
        ];
        if let Some(email) = email {
            form.push(("customer_email", email.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, e.to_string()))?;

        let session: CheckoutSession = check_response_json(PROVIDER, response).await?;
        tracing::info!(uid, plan = %plan, session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }
}

/// Stripe event envelope.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Map a verified Stripe event to a subscription update for a user.
///
/// `Ok(None)` means the event is not one we act on.
pub fn normalize_event(
    event: &StripeEvent,
) -> Result<Option<(String, SubscriptionUpdate)>, AppError> {
    let object = &event.data.object;

    match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            if json_str(object, &["payment_status"]) != Some("paid") {
                tracing::info!(event_id = %event.id, "Checkout session not paid yet, ignoring");
                return Ok(None);
            }

            let uid = json_str(object, &["client_reference_id"])
                .or_else(|| json_str(object, &["metadata", "uid"]))
                .ok_or_else(|| AppError::BadRequest("checkout session has no uid".to_string()))?;

            let plan = parse_plan(json_str(object, &["metadata", "plan"]))?;

            let provider_ids = ProviderIds {
                customer_id: json_str(object, &["customer"]).map(str::to_string),
                subscription_id: None,
                order_id: json_str(object, &["id"]).map(str::to_string),
                payment_id: json_str(object, &["payment_intent"]).map(str::to_string),
            };

            Ok(Some((
                uid.to_string(),
                SubscriptionUpdate::activate(plan, PaymentProvider::Stripe, provider_ids),
            )))
        }
        "customer.subscription.deleted" => Ok(json_str(object, &["metadata", "uid"]).map(|uid| {
            (
                uid.to_string(),
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Stripe,
                    json_str(object, &["id"]),
                ),
            )
        })),
        "invoice.payment_failed" => Ok(json_str(
            object,
            &["subscription_details", "metadata", "uid"],
        )
        .or_else(|| json_str(object, &["metadata", "uid"]))
        .map(|uid| {
            (
                uid.to_string(),
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::PastDue,
                    PaymentProvider::Stripe,
                    json_str(object, &["subscription"]),
                ),
            )
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_test",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_paid_checkout_activates_plan() {
        let event = event(
            "checkout.session.completed",
            json!({
                "id": "cs_test_1",
                "payment_status": "paid",
                "client_reference_id": "uid-42",
                "customer": "cus_1",
                "payment_intent": "pi_1",
                "metadata": { "uid": "uid-42", "plan": "SAGE_MODE_QUARTERLY" }
            }),
        );

        let (uid, update) = normalize_event(&event).unwrap().unwrap();
        assert_eq!(uid, "uid-42");
        assert_eq!(
            update,
            SubscriptionUpdate::activate(
                Plan::SageModeQuarterly,
                PaymentProvider::Stripe,
                ProviderIds {
                    customer_id: Some("cus_1".to_string()),
                    subscription_id: None,
                    order_id: Some("cs_test_1".to_string()),
                    payment_id: Some("pi_1".to_string()),
                }
            )
        );
    }

    #[test]
    fn test_unpaid_checkout_is_ignored() {
        let event = event(
            "checkout.session.completed",
            json!({ "payment_status": "unpaid", "metadata": { "uid": "u", "plan": "SAGE_MODE_YEARLY" } }),
        );
        assert!(normalize_event(&event).unwrap().is_none());
    }

    #[test]
    fn test_checkout_with_unknown_plan_is_rejected() {
        let event = event(
            "checkout.session.completed",
            json!({ "payment_status": "paid", "metadata": { "uid": "u", "plan": "GOLD" } }),
        );
        assert!(matches!(
            normalize_event(&event),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_subscription_deleted_marks_canceled() {
        let event = event(
            "customer.subscription.deleted",
            json!({ "id": "sub_9", "metadata": { "uid": "uid-7" } }),
        );
        let (uid, update) = normalize_event(&event).unwrap().unwrap();
        assert_eq!(uid, "uid-7");
        assert_eq!(
            update,
            SubscriptionUpdate::set_status(
                SubscriptionStatus::Canceled,
                PaymentProvider::Stripe,
                Some("sub_9"),
            )
        );
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let event = event("customer.created", json!({ "id": "cus_1" }));
        assert!(normalize_event(&event).unwrap().is_none());
    }
}
