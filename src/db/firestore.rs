// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and subscription storage)
//! - Orders (provider order ID to user mapping)
//! - Topics (generated study material)

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{Order, Subscription, Topic, User};
use async_trait::async_trait;
use firestore::paths;
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Only the `subscription` field of a user document.
#[derive(Serialize, Deserialize)]
struct SubscriptionField {
    subscription: Subscription,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// Uses the service account JSON when provided, otherwise application
    /// default credentials. For local development with the emulator, set
    /// FIRESTORE_EMULATOR_HOST.
    pub async fn new(
        project_id: &str,
        service_account_json: Option<&str>,
    ) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = match service_account_json {
            Some(json) => firestore::FirestoreDb::with_options_token_source(
                firestore::FirestoreDbOptions::new(project_id.to_string()),
                gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
                gcloud_sdk::TokenSourceType::Json(json.to_string()),
            )
            .await,
            None => firestore::FirestoreDb::new(project_id).await,
        }
        .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    ///
    /// Used when Firestore is not configured so the rest of the service can
    /// still start.
    pub fn new_offline() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, collection: &str, doc_ids: &[String]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        // Masked to the profile fields: `subscription` belongs to set_subscription.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{
                uid,
                email,
                display_name,
                grade_level,
                subjects,
                onboarded_at,
                created_at
            }))
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_subscription(
        &self,
        uid: &str,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        let field = SubscriptionField {
            subscription: subscription.clone(),
        };

        // The update mask covers the whole map field, so Firestore replaces
        // it in one write instead of merging nested keys.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(SubscriptionField::{subscription}))
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&field)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Order Operations ────────────────────────────────────────

    async fn create_order(&self, order: &Order) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ORDERS)
            .document_id(&order.order_id)
            .object(order)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ORDERS)
            .obj()
            .one(order_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Topic Operations ────────────────────────────────────────

    async fn create_topic(&self, topic: &Topic) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOPICS)
            .document_id(&topic.id)
            .object(topic)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOPICS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_topics(&self, uid: &str) -> Result<Vec<Topic>, AppError> {
        let uid = uid.to_string();
        let mut topics: Vec<Topic> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TOPICS)
            .filter(move |q| q.for_all([q.field("uid").eq(uid.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Timestamps are stored as RFC 3339 strings, so sort after decoding.
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(topics)
    }

    // ─── User Data Deletion ──────────────────────────────────────

    async fn delete_user_data(&self, uid: &str) -> Result<usize, AppError> {
        let topic_ids: Vec<String> = self
            .list_topics(uid)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        self.batch_delete(collections::TOPICS, &topic_ids).await?;
        tracing::debug!(uid, count = topic_ids.len(), "Deleted topics");

        let mut deleted_count = topic_ids.len();
        if self.get_user(uid).await?.is_some() {
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::USERS)
                .document_id(uid)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            deleted_count += 1;
        }
        tracing::info!(uid, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
