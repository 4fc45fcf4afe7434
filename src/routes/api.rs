// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Subscription, User};
use crate::AppState;
use axum::{
    extract::State,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via Firebase ID token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/subscription", get(get_subscription))
        .route("/api/onboarding", post(complete_onboarding))
        .route("/api/account", delete(delete_account))
}

// ─── Subscription ────────────────────────────────────────────

/// Subscription state as the frontend sees it.
///
/// `status` is the effective status: a stored active subscription past its
/// expiry is reported as `expired`.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionView {
    pub active: bool,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionView {
    pub fn new(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        match subscription {
            Some(s) => Self {
                active: s.is_active(now),
                plan: Some(s.plan.id().to_string()),
                status: Some(s.effective_status(now).to_string()),
                provider: Some(s.provider.name().to_string()),
                expires_at: Some(s.expires_at),
            },
            None => Self {
                active: false,
                plan: None,
                status: None,
                provider: None,
                expires_at: None,
            },
        }
    }
}

/// Get the current user's subscription.
async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubscriptionView>> {
    let subscription = state
        .store
        .get_user(&user.uid)
        .await?
        .and_then(|u| u.subscription);

    Ok(Json(SubscriptionView::new(subscription.as_ref(), Utc::now())))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub grade_level: Option<String>,
    pub subjects: Vec<String>,
    pub onboarded: bool,
    pub subscription: SubscriptionView,
}

impl UserResponse {
    fn new(user: User, now: DateTime<Utc>) -> Self {
        Self {
            subscription: SubscriptionView::new(user.subscription.as_ref(), now),
            onboarded: user.onboarded_at.is_some(),
            uid: user.uid,
            email: user.email,
            display_name: user.display_name,
            grade_level: user.grade_level,
            subjects: user.subjects,
        }
    }
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .store
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(UserResponse::new(profile, Utc::now())))
}

// ─── Onboarding ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct OnboardingRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(length(min = 1, max = 50))]
    pub grade_level: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub subjects: Vec<String>,
}

/// Create or update the profile fields collected during onboarding.
///
/// Only profile fields are written; the subscription shown in the response
/// is the one read at the start of the request.
async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;
    if req.subjects.iter().any(|s| s.trim().is_empty() || s.len() > 100) {
        return Err(AppError::BadRequest("invalid subject".to_string()));
    }

    let now = Utc::now();
    let mut profile = state
        .store
        .get_user(&user.uid)
        .await?
        .unwrap_or_else(|| User::new(user.uid.clone(), user.email.clone(), now));

    profile.display_name = Some(req.display_name.trim().to_string());
    profile.grade_level = req.grade_level;
    profile.subjects = req.subjects;
    profile.onboarded_at.get_or_insert(now);
    if profile.email.is_none() {
        profile.email = user.email;
    }

    state.store.upsert_user(&profile).await?;
    tracing::info!(uid = %profile.uid, "Onboarding completed");

    Ok(Json(UserResponse::new(profile, now)))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub deleted: usize,
}

/// Delete the user record and all topics (GDPR compliance).
///
/// Order records stay behind for payment reconciliation. The Firebase Auth
/// identity itself is removed by the frontend.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(uid = %user.uid, "User-initiated account deletion");

    let deleted = state.store.delete_user_data(&user.uid).await?;

    tracing::info!(uid = %user.uid, deleted, "Account data deleted");
    Ok(Json(DeleteAccountResponse {
        success: true,
        deleted,
    }))
}
