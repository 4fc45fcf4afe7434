// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sage API Server
//!
//! Payment webhooks, subscription state and AI study material generation
//! for the Sage study-aid frontend.

use sage_api::{
    config::{Config, DataBackend},
    db::{FirestoreDb, MemoryDb, Store},
    services::{
        FirebaseAuthVerifier, GeminiClient, PaypalClient, RazorpayClient, StripeClient,
        StudyGenerator, SubscriptionWriter,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Sage API");

    let store = connect_store(&config).await;
    let subscriptions = SubscriptionWriter::new(store.clone());

    let stripe = StripeClient::new(config.stripe.secret_key.clone())?;
    let razorpay = RazorpayClient::new(config.razorpay.clone())?;
    let paypal = PaypalClient::new(config.paypal.clone())?;
    log_missing_credentials(&config);

    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?;
    let generator = StudyGenerator::new(Arc::new(gemini));
    tracing::info!(model = %config.gemini_model, "Gemini client initialized");

    let auth_verifier = Arc::new(FirebaseAuthVerifier::new(&config.firebase_project_id)?);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        subscriptions,
        stripe,
        razorpay,
        paypal,
        generator,
        auth_verifier,
    });

    // Build router
    let app = sage_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Pick the document store. A Firestore connection failure leaves the
/// service running against an offline client so webhooks fail with 500
/// (and are retried by the provider) rather than the process exiting.
async fn connect_store(config: &Config) -> Arc<dyn Store> {
    match config.data_backend {
        DataBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
        DataBackend::Firestore => {
            match FirestoreDb::new(
                &config.firebase_project_id,
                config.firebase_service_account_json.as_deref(),
            )
            .await
            {
                Ok(db) => Arc::new(db),
                Err(e) => {
                    tracing::warn!(error = %e, "Firestore unavailable, starting offline");
                    Arc::new(FirestoreDb::new_offline())
                }
            }
        }
    }
}

fn log_missing_credentials(config: &Config) {
    let missing = [
        ("STRIPE_SECRET_KEY", config.stripe.secret_key.is_none()),
        ("STRIPE_WEBHOOK_SECRET", config.stripe.webhook_secret.is_none()),
        ("RAZORPAY_KEY_SECRET", config.razorpay.key_secret.is_none()),
        (
            "RAZORPAY_WEBHOOK_SECRET",
            config.razorpay.webhook_secret.is_none(),
        ),
        ("PAYPAL_CLIENT_SECRET", config.paypal.client_secret.is_none()),
        ("PADDLE_WEBHOOK_SECRET", config.paddle_webhook_secret.is_none()),
        ("GEMINI_API_KEY", config.gemini_api_key.is_none()),
    ];

    for (name, is_missing) in missing {
        if is_missing {
            tracing::warn!(variable = name, "Credential not set; feature disabled");
        }
    }
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sage_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
