// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local document store used for local development and tests.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Order, Subscription, Topic, User};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory store with the same write semantics as `FirestoreDb`.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    orders: Arc<DashMap<String, Order>>,
    topics: Arc<DashMap<String, Topic>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(uid).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users
            .entry(user.uid.clone())
            .and_modify(|stored| {
                let subscription = stored.subscription.take();
                *stored = User {
                    subscription,
                    ..user.clone()
                };
            })
            .or_insert_with(|| User {
                subscription: None,
                ..user.clone()
            });
        Ok(())
    }

    async fn set_subscription(
        &self,
        uid: &str,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        // The entry guard holds the shard lock, so the field swap is atomic.
        self.users
            .entry(uid.to_string())
            .and_modify(|user| user.subscription = Some(subscription.clone()))
            .or_insert_with(|| {
                let mut user = User::new(uid, None, Utc::now());
                user.subscription = Some(subscription.clone());
                user
            });
        Ok(())
    }

    async fn create_order(&self, order: &Order) -> Result<(), AppError> {
        self.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self.orders.get(order_id).map(|o| o.clone()))
    }

    async fn create_topic(&self, topic: &Topic) -> Result<(), AppError> {
        self.topics.insert(topic.id.clone(), topic.clone());
        Ok(())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        Ok(self.topics.get(id).map(|t| t.clone()))
    }

    async fn list_topics(&self, uid: &str) -> Result<Vec<Topic>, AppError> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .filter(|t| t.uid == uid)
            .map(|t| t.clone())
            .collect();
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(topics)
    }

    async fn delete_user_data(&self, uid: &str) -> Result<usize, AppError> {
        let before = self.topics.len();
        self.topics.retain(|_, t| t.uid != uid);
        let mut deleted = before - self.topics.len();

        if self.users.remove(uid).is_some() {
            deleted += 1;
        }
        Ok(deleted)
    }
}
