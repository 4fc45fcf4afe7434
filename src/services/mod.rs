// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod firebase_auth;
pub mod gemini;
pub mod generation;
pub mod http;
pub mod paddle;
pub mod paypal;
pub mod razorpay;
pub mod signature;
pub mod stripe;
pub mod subscription;

pub use firebase_auth::{AuthError, FirebaseAuthVerifier, VerifiedIdentity};
pub use gemini::{GeminiClient, ResponseFormat, TextModel};
pub use generation::{StudyGenerator, TopicSize};
pub use paypal::PaypalClient;
pub use razorpay::RazorpayClient;
pub use stripe::StripeClient;
pub use subscription::{SubscriptionUpdate, SubscriptionWriter};
