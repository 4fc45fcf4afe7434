// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token authentication middleware.

use crate::services::firebase_auth::AuthError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie set by Firebase Hosting session flows.
pub const SESSION_COOKIE: &str = "__session";

/// Authenticated user extracted from the ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Middleware that requires a valid Firebase ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Header first, then cookie
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = match bearer {
        Some(token) => token,
        None => match jar.get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => return Err(StatusCode::UNAUTHORIZED),
        },
    };

    let identity = state
        .auth_verifier
        .verify_id_token(&token)
        .await
        .map_err(|err| match err {
            AuthError::Unauthorized(reason) => {
                tracing::debug!(reason = %reason, "Rejected ID token");
                StatusCode::UNAUTHORIZED
            }
            AuthError::Transient(reason) => {
                tracing::error!(reason = %reason, "ID token verification transient failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    request.extensions_mut().insert(AuthUser {
        uid: identity.uid,
        email: identity.email,
    });

    Ok(next.run(request).await)
}
