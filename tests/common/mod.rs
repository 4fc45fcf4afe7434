// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use sage_api::config::Config;
use sage_api::db::{FirestoreDb, MemoryDb, Store};
use sage_api::error::AppError;
use sage_api::routes::create_router;
use sage_api::services::signature::hmac_sha256_hex;
use sage_api::services::{
    FirebaseAuthVerifier, PaypalClient, RazorpayClient, ResponseFormat, StripeClient,
    StudyGenerator, SubscriptionWriter, TextModel,
};
use sage_api::AppState;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Static HS256 key the test verifier accepts.
pub const TEST_AUTH_KEY: &[u8] = b"sage-test-id-token-key";
pub const TEST_AUTH_KID: &str = "test-kid";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project", None)
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Text model that answers every flow with a fixed, well-formed reply.
#[allow(dead_code)]
pub struct CannedModel {
    pub notes: String,
    pub flashcards: String,
    pub quiz: String,
}

impl Default for CannedModel {
    fn default() -> Self {
        Self {
            notes: "# Photosynthesis\n\nPlants turn light into chemical energy.".to_string(),
            flashcards: r#"{"flashcards":[
                {"front":"Chlorophyll","back":"Green pigment that absorbs light"},
                {"front":"Stomata","back":"Pores for gas exchange"}
            ]}"#
            .to_string(),
            quiz: r#"{"questions":[
                {"question":"Where does photosynthesis happen?",
                 "options":["Mitochondria","Chloroplast","Nucleus","Ribosome"],
                 "answer_index":1}
            ]}"#
            .to_string(),
        }
    }
}

#[async_trait]
impl TextModel for CannedModel {
    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String, AppError> {
        Ok(match format {
            ResponseFormat::Text => self.notes.clone(),
            ResponseFormat::Json if prompt.contains("flashcards") => self.flashcards.clone(),
            ResponseFormat::Json => self.quiz.clone(),
        })
    }
}

/// Create a test app backed by the in-memory store and the canned model.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), CannedModel::default())
}

/// Create a test app with a custom configuration and text model.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    model: impl TextModel + 'static,
) -> (axum::Router, Arc<AppState>) {
    create_test_app_with_store(config, model, Arc::new(MemoryDb::new()))
}

/// Create a test app on a caller-supplied store.
#[allow(dead_code)]
pub fn create_test_app_with_store(
    config: Config,
    model: impl TextModel + 'static,
    store: Arc<dyn Store>,
) -> (axum::Router, Arc<AppState>) {

    let auth_verifier = Arc::new(
        FirebaseAuthVerifier::new_with_static_key(
            &config.firebase_project_id,
            TEST_AUTH_KID,
            Algorithm::HS256,
            DecodingKey::from_secret(TEST_AUTH_KEY),
        )
        .unwrap(),
    );

    let state = Arc::new(AppState {
        subscriptions: SubscriptionWriter::new(store.clone()),
        stripe: StripeClient::new(config.stripe.secret_key.clone()).unwrap(),
        razorpay: RazorpayClient::new(config.razorpay.clone()).unwrap(),
        paypal: PaypalClient::new(config.paypal.clone()).unwrap(),
        generator: StudyGenerator::new(Arc::new(model)),
        auth_verifier,
        store,
        config,
    });

    (create_router(state.clone()), state)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Create a Firebase-shaped ID token the test verifier accepts.
#[allow(dead_code)]
pub fn create_test_token(uid: &str) -> String {
    create_token_for_project(uid, "test-project")
}

/// Create an ID token for an arbitrary Firebase project.
#[allow(dead_code)]
pub fn create_token_for_project(uid: &str, project: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        iss: String,
        aud: &'a str,
        sub: &'a str,
        iat: u64,
        exp: u64,
        email: String,
    }

    let now = now_secs();
    let claims = Claims {
        iss: format!("https://securetoken.google.com/{}", project),
        aud: project,
        sub: uid,
        iat: now,
        exp: now + 3600,
        email: format!("{}@example.com", uid),
    };

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_AUTH_KID.to_string());

    encode(&header, &claims, &EncodingKey::from_secret(TEST_AUTH_KEY)).unwrap()
}

/// `Stripe-Signature` header for `body`, signed now.
#[allow(dead_code)]
pub fn stripe_signature(secret: &str, body: &str) -> String {
    stripe_signature_at(secret, body, now_secs() as i64)
}

#[allow(dead_code)]
pub fn stripe_signature_at(secret: &str, body: &str, timestamp: i64) -> String {
    let signed = format!("{}.{}", timestamp, body);
    format!(
        "t={},v1={}",
        timestamp,
        hmac_sha256_hex(secret.as_bytes(), signed.as_bytes())
    )
}

/// `Paddle-Signature` header for `body`, signed now.
#[allow(dead_code)]
pub fn paddle_signature(secret: &str, body: &str) -> String {
    paddle_signature_at(secret, body, now_secs() as i64)
}

#[allow(dead_code)]
pub fn paddle_signature_at(secret: &str, body: &str, timestamp: i64) -> String {
    let signed = format!("{}:{}", timestamp, body);
    format!(
        "ts={};h1={}",
        timestamp,
        hmac_sha256_hex(secret.as_bytes(), signed.as_bytes())
    )
}

/// `X-Razorpay-Signature` header for a webhook `body`.
#[allow(dead_code)]
pub fn razorpay_webhook_signature(secret: &str, body: &str) -> String {
    hmac_sha256_hex(secret.as_bytes(), body.as_bytes())
}

/// Signature Razorpay Checkout returns for an order/payment pair.
#[allow(dead_code)]
pub fn razorpay_payment_signature(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(
        key_secret.as_bytes(),
        format!("{}|{}", order_id, payment_id).as_bytes(),
    )
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
