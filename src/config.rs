//! Application configuration loaded from environment variables.
//!
//! Every provider credential is optional. A missing credential disables the
//! feature that needs it; the handler reports "service not configured" at
//! call time instead of the process refusing to start.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::env;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.sandbox.paypal.com";

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBackend {
    Firestore,
    /// Process-local store for local development and tests.
    Memory,
}

/// Stripe credentials.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Razorpay credentials.
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

/// PayPal REST credentials.
#[derive(Debug, Clone)]
pub struct PaypalConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Sandbox or live REST endpoint.
    pub api_base: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for payment redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    pub data_backend: DataBackend,

    /// Firebase project ID (Firestore + Auth audience)
    pub firebase_project_id: String,
    /// Service account JSON, decoded from `FIREBASE_SERVICE_ACCOUNT_KEY`
    pub firebase_service_account_json: Option<String>,

    pub stripe: StripeConfig,
    pub razorpay: RazorpayConfig,
    pub paypal: PaypalConfig,
    pub paddle_webhook_secret: Option<String>,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let firebase_service_account_json = optional("FIREBASE_SERVICE_ACCOUNT_KEY")
            .map(|raw| decode_service_account(&raw))
            .transpose()?;

        let firebase_project_id = match optional("FIREBASE_PROJECT_ID") {
            Some(id) => id,
            None => firebase_service_account_json
                .as_deref()
                .and_then(project_id_from_service_account)
                .unwrap_or_else(|| "local-dev".to_string()),
        };

        let data_backend = match optional("DATA_BACKEND").as_deref() {
            None | Some("firestore") => DataBackend::Firestore,
            Some("memory") => DataBackend::Memory,
            Some(other) => return Err(ConfigError::Invalid("DATA_BACKEND", other.to_string())),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            data_backend,
            firebase_project_id,
            firebase_service_account_json,
            stripe: StripeConfig {
                secret_key: optional("STRIPE_SECRET_KEY"),
                webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            },
            razorpay: RazorpayConfig {
                key_id: optional("RAZORPAY_KEY_ID"),
                key_secret: optional("RAZORPAY_KEY_SECRET"),
                webhook_secret: optional("RAZORPAY_WEBHOOK_SECRET"),
            },
            paypal: PaypalConfig {
                client_id: optional("PAYPAL_CLIENT_ID"),
                client_secret: optional("PAYPAL_CLIENT_SECRET"),
                api_base: optional("PAYPAL_API_BASE")
                    .unwrap_or_else(|| DEFAULT_PAYPAL_API_BASE.to_string()),
            },
            paddle_webhook_secret: optional("PADDLE_WEBHOOK_SECRET"),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        })
    }

    /// Deterministic configuration for tests. All secrets are set.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            data_backend: DataBackend::Memory,
            firebase_project_id: "test-project".to_string(),
            firebase_service_account_json: None,
            stripe: StripeConfig {
                secret_key: Some("sk_test_secret".to_string()),
                webhook_secret: Some("whsec_test_secret".to_string()),
            },
            razorpay: RazorpayConfig {
                key_id: Some("rzp_test_key".to_string()),
                key_secret: Some("rzp_test_secret".to_string()),
                webhook_secret: Some("rzp_webhook_secret".to_string()),
            },
            paypal: PaypalConfig {
                client_id: Some("paypal_test_client".to_string()),
                client_secret: Some("paypal_test_secret".to_string()),
                api_base: DEFAULT_PAYPAL_API_BASE.to_string(),
            },
            paddle_webhook_secret: Some("pdl_ntfset_test_secret".to_string()),
            gemini_api_key: Some("test_gemini_key".to_string()),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

/// Read an environment variable, treating empty values as absent.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accept the service account key either as raw JSON or base64-encoded JSON.
fn decode_service_account(raw: &str) -> Result<String, ConfigError> {
    let json = if raw.starts_with('{') {
        raw.to_string()
    } else {
        let bytes = BASE64
            .decode(raw)
            .map_err(|e| ConfigError::Invalid("FIREBASE_SERVICE_ACCOUNT_KEY", e.to_string()))?;
        String::from_utf8(bytes)
            .map_err(|e| ConfigError::Invalid("FIREBASE_SERVICE_ACCOUNT_KEY", e.to_string()))?
    };

    serde_json::from_str::<serde_json::Value>(&json)
        .map_err(|e| ConfigError::Invalid("FIREBASE_SERVICE_ACCOUNT_KEY", e.to_string()))?;

    Ok(json)
}

fn project_id_from_service_account(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value
        .get("project_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
