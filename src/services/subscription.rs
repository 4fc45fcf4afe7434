// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription state writer.
//!
//! Payment handlers normalize provider events into a `SubscriptionUpdate`
//! and hand it here. Writes replace the user's whole `subscription` object,
//! so concurrent deliveries for the same user resolve to whichever write
//! lands last. There is no version check.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{PaymentProvider, Plan, ProviderIds, Subscription, SubscriptionStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A normalized change to a user's entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionUpdate {
    /// Payment succeeded: start a fresh entitlement for `plan`.
    Activate {
        plan: Plan,
        provider: PaymentProvider,
        provider_ids: ProviderIds,
    },
    /// Provider reports a status change on the existing entitlement.
    ///
    /// Only applies when the stored entitlement came from `provider` and,
    /// if both sides carry one, from the same provider subscription.
    SetStatus {
        status: SubscriptionStatus,
        provider: PaymentProvider,
        subscription_id: Option<String>,
    },
}

impl SubscriptionUpdate {
    pub fn activate(plan: Plan, provider: PaymentProvider, provider_ids: ProviderIds) -> Self {
        SubscriptionUpdate::Activate {
            plan,
            provider,
            provider_ids,
        }
    }

    pub fn set_status(
        status: SubscriptionStatus,
        provider: PaymentProvider,
        subscription_id: Option<&str>,
    ) -> Self {
        SubscriptionUpdate::SetStatus {
            status,
            provider,
            subscription_id: subscription_id.map(str::to_string),
        }
    }
}

/// String at a nested object path inside a provider payload.
pub(crate) fn json_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Parse a plan identifier carried in provider metadata.
pub(crate) fn parse_plan(raw: Option<&str>) -> Result<Plan, AppError> {
    raw.ok_or_else(|| AppError::BadRequest("payment has no plan".to_string()))?
        .parse()
        .map_err(|e: crate::models::plan::UnknownPlan| AppError::BadRequest(e.to_string()))
}

/// Build the subscription object for a successful payment at `now`.
pub fn activated_subscription(
    plan: Plan,
    provider: PaymentProvider,
    provider_ids: ProviderIds,
    now: DateTime<Utc>,
) -> Subscription {
    Subscription {
        plan,
        status: SubscriptionStatus::Active,
        provider,
        provider_ids,
        started_at: now,
        expires_at: plan.expires_at(now),
        updated_at: now,
    }
}

/// Applies normalized updates to user records.
#[derive(Clone)]
pub struct SubscriptionWriter {
    store: Arc<dyn Store>,
}

impl SubscriptionWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply `update` for `uid` at `now`.
    ///
    /// Returns the subscription as written, or `None` when a status change
    /// has nothing to apply to: no subscription, or one held through a
    /// different provider or provider subscription.
    pub async fn apply(
        &self,
        uid: &str,
        update: SubscriptionUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError> {
        let subscription = match update {
            SubscriptionUpdate::Activate {
                plan,
                provider,
                provider_ids,
            } => activated_subscription(plan, provider, provider_ids, now),
            SubscriptionUpdate::SetStatus {
                status,
                provider,
                subscription_id,
            } => {
                let current = self
                    .store
                    .get_user(uid)
                    .await?
                    .and_then(|user| user.subscription);

                let Some(mut current) = current else {
                    tracing::warn!(uid, %status, "Status update for user without subscription, ignoring");
                    return Ok(None);
                };

                if current.provider != provider {
                    tracing::warn!(
                        uid,
                        %status,
                        event_provider = provider.name(),
                        current_provider = current.provider.name(),
                        "Status update from a different provider than the entitlement, ignoring"
                    );
                    return Ok(None);
                }

                if let (Some(event_id), Some(current_id)) =
                    (subscription_id.as_deref(), current.provider_ids.subscription_id.as_deref())
                {
                    if event_id != current_id {
                        tracing::warn!(
                            uid,
                            %status,
                            event_subscription = event_id,
                            current_subscription = current_id,
                            "Status update for a superseded subscription, ignoring"
                        );
                        return Ok(None);
                    }
                }

                current.status = status;
                current.updated_at = now;
                current
            }
        };

        self.store.set_subscription(uid, &subscription).await?;

        tracing::info!(
            uid,
            plan = %subscription.plan,
            status = %subscription.status,
            provider = subscription.provider.name(),
            expires_at = %subscription.expires_at,
            "Subscription written"
        );

        Ok(Some(subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use chrono::{Duration, TimeZone};

    fn writer() -> (SubscriptionWriter, Arc<MemoryDb>) {
        let db = Arc::new(MemoryDb::new());
        (SubscriptionWriter::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_activate_yearly_sets_expiry_and_active() {
        let (writer, db) = writer();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();

        let written = writer
            .apply(
                "uid-1",
                SubscriptionUpdate::activate(
                    Plan::SageModeYearly,
                    PaymentProvider::Razorpay,
                    ProviderIds::default(),
                ),
                now,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(written.status, SubscriptionStatus::Active);
        assert_eq!(written.expires_at, now + Duration::days(365));
        assert_eq!(written.started_at, now);

        let stored = db.get_user("uid-1").await.unwrap().unwrap();
        assert_eq!(stored.subscription, Some(written));
    }

    #[tokio::test]
    async fn test_set_status_keeps_plan_and_expiry() {
        let (writer, db) = writer();
        let now = Utc::now();
        writer
            .apply(
                "uid-2",
                SubscriptionUpdate::activate(
                    Plan::SageModeMonthly,
                    PaymentProvider::Stripe,
                    ProviderIds::default(),
                ),
                now,
            )
            .await
            .unwrap();

        let later = now + Duration::days(2);
        let updated = writer
            .apply(
                "uid-2",
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Stripe,
                    None,
                ),
                later,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, SubscriptionStatus::Canceled);
        assert_eq!(updated.plan, Plan::SageModeMonthly);
        assert_eq!(updated.expires_at, now + Duration::days(30));
        assert_eq!(updated.updated_at, later);

        let stored = db.get_user("uid-2").await.unwrap().unwrap();
        assert_eq!(stored.subscription, Some(updated));
    }

    #[tokio::test]
    async fn test_set_status_without_subscription_is_noop() {
        let (writer, db) = writer();
        let result = writer
            .apply(
                "nobody",
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::PastDue,
                    PaymentProvider::Stripe,
                    None,
                ),
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(db.get_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_from_other_provider_keeps_entitlement() {
        let (writer, db) = writer();
        let now = Utc::now();
        let pass = writer
            .apply(
                "uid-3",
                SubscriptionUpdate::activate(
                    Plan::SageModeYearly,
                    PaymentProvider::Razorpay,
                    ProviderIds::default(),
                ),
                now,
            )
            .await
            .unwrap()
            .unwrap();

        let result = writer
            .apply(
                "uid-3",
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Stripe,
                    Some("sub_old"),
                ),
                now + Duration::minutes(5),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        let stored = db.get_user("uid-3").await.unwrap().unwrap();
        assert_eq!(stored.subscription, Some(pass));
    }

    #[tokio::test]
    async fn test_cancel_for_superseded_subscription_is_ignored() {
        let (writer, db) = writer();
        let now = Utc::now();
        writer
            .apply(
                "uid-4",
                SubscriptionUpdate::activate(
                    Plan::SageModeMonthly,
                    PaymentProvider::Paddle,
                    ProviderIds {
                        subscription_id: Some("sub_new".to_string()),
                        ..ProviderIds::default()
                    },
                ),
                now,
            )
            .await
            .unwrap();

        let stale = writer
            .apply(
                "uid-4",
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Paddle,
                    Some("sub_old"),
                ),
                now,
            )
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = writer
            .apply(
                "uid-4",
                SubscriptionUpdate::set_status(
                    SubscriptionStatus::Canceled,
                    PaymentProvider::Paddle,
                    Some("sub_new"),
                ),
                now,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, SubscriptionStatus::Canceled);

        let stored = db.get_user("uid-4").await.unwrap().unwrap();
        assert_eq!(stored.subscription, Some(current));
    }
}
