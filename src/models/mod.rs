// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod order;
pub mod plan;
pub mod topic;
pub mod user;

pub use order::Order;
pub use plan::{Currency, Plan};
pub use topic::{Flashcard, QuizQuestion, Topic};
pub use user::{PaymentProvider, ProviderIds, Subscription, SubscriptionStatus, User};
