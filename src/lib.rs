// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sage: backend for an AI study-aid service
//!
//! This crate provides the backend API for payment webhooks, subscription
//! state and AI-generated study material (notes, flashcards, quizzes).

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::{
    FirebaseAuthVerifier, PaypalClient, RazorpayClient, StripeClient, StudyGenerator,
    SubscriptionWriter,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub subscriptions: SubscriptionWriter,
    pub stripe: StripeClient,
    pub razorpay: RazorpayClient,
    pub paypal: PaypalClient,
    pub generator: StudyGenerator,
    pub auth_verifier: Arc<FirebaseAuthVerifier>,
}
