// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study topic routes: generate, list and read.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::topic::MAX_ITEMS_PER_FLOW;
use crate::models::Topic;
use crate::services::TopicSize;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Topics a user without an active subscription may create.
pub const FREE_TOPIC_LIMIT: usize = 3;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/topics", get(list_topics).post(create_topic))
        .route("/api/topics/{id}", get(get_topic))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 2, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 50))]
    pub flashcards: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub questions: Option<usize>,
}

impl CreateTopicRequest {
    fn size(&self) -> TopicSize {
        let default = TopicSize::default();
        TopicSize {
            flashcards: self
                .flashcards
                .unwrap_or(default.flashcards)
                .min(MAX_ITEMS_PER_FLOW),
            questions: self
                .questions
                .unwrap_or(default.questions)
                .min(MAX_ITEMS_PER_FLOW),
        }
    }
}

/// Generate notes, flashcards and a quiz for a new topic.
async fn create_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTopicRequest>,
) -> Result<Json<Topic>> {
    req.validate()?;
    let title = req.title.trim();
    if title.len() < 2 {
        return Err(AppError::BadRequest("title is too short".to_string()));
    }

    let now = Utc::now();
    let subscribed = state
        .store
        .get_user(&user.uid)
        .await?
        .is_some_and(|u| u.has_active_subscription(now));

    if !subscribed {
        let existing = state.store.list_topics(&user.uid).await?.len();
        if existing >= FREE_TOPIC_LIMIT {
            tracing::info!(uid = %user.uid, existing, "Free topic limit reached");
            return Err(AppError::Forbidden(format!(
                "free accounts are limited to {} topics",
                FREE_TOPIC_LIMIT
            )));
        }
    }

    let topic = state.generator.topic(&user.uid, title, req.size()).await?;
    state.store.create_topic(&topic).await?;

    Ok(Json(topic))
}

/// Topic list entry (no generated content).
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopicSummary {
    pub id: String,
    pub title: String,
    pub flashcards: usize,
    pub questions: usize,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopicsResponse {
    pub topics: Vec<TopicSummary>,
}

/// List the user's topics, newest first.
async fn list_topics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TopicsResponse>> {
    let topics = state
        .store
        .list_topics(&user.uid)
        .await?
        .into_iter()
        .map(|t| TopicSummary {
            flashcards: t.flashcards.len(),
            questions: t.quiz.len(),
            id: t.id,
            title: t.title,
            created_at: t.created_at,
        })
        .collect();

    Ok(Json(TopicsResponse { topics }))
}

/// Read one topic. Topics owned by someone else are reported as missing.
async fn get_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Topic>> {
    state
        .store
        .get_topic(&id)
        .await?
        .filter(|t| t.uid == user.uid)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", id)))
}
