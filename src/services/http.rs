// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared HTTP plumbing for third-party provider APIs.

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

/// Request timeout for payment provider calls.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a reqwest client with the provider timeout.
pub fn provider_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()?)
}

/// Check response status and parse the JSON body.
pub async fn check_response_json<T: for<'de> Deserialize<'de>>(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!(provider, "Provider rate limit hit (429)");
        }

        return Err(AppError::provider(
            provider,
            format!("HTTP {}: {}", status, body),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::provider(provider, format!("JSON parse error: {}", e)))
}
