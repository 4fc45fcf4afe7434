//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Plan;

/// User profile stored in Firestore at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Firebase Auth UID (also used as document ID)
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    /// When onboarding was completed
    #[serde(default)]
    pub onboarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Current paid entitlement, if the user ever bought one
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl User {
    /// A fresh record for a newly seen Firebase identity.
    pub fn new(uid: impl Into<String>, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            email,
            display_name: None,
            grade_level: None,
            subjects: Vec::new(),
            onboarded_at: None,
            created_at: now,
            subscription: None,
        }
    }

    /// Whether the user holds an entitlement that is valid at `now`.
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.is_active(now))
    }
}

/// Stored subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    /// Never written; derived when an active record is past its expiry.
    Expired,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        })
    }
}

/// Payment provider that produced a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Razorpay,
    Paypal,
    Paddle,
}

impl PaymentProvider {
    pub fn name(self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "Stripe",
            PaymentProvider::Razorpay => "Razorpay",
            PaymentProvider::Paypal => "PayPal",
            PaymentProvider::Paddle => "Paddle",
        }
    }
}

/// Provider-side identifiers kept for support lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// The `subscription` sub-object of a user record.
///
/// Always written as a whole; see `SubscriptionWriter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub provider: PaymentProvider,
    #[serde(default)]
    pub provider_ids: ProviderIds,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active only while the status is active and the expiry is in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at > now
    }

    /// Status as seen by readers at `now`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Active if self.expires_at <= now => SubscriptionStatus::Expired,
            status => status,
        }
    }
}
