// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study material flows: notes, flashcards and quizzes.
//!
//! Each flow fills a prompt template, makes one model call and validates the
//! reply. A reply that is not JSON, or that fails validation, is an error;
//! callers never see a partially populated result.

use crate::error::AppError;
use crate::models::topic::MAX_ITEMS_PER_FLOW;
use crate::models::{Flashcard, QuizQuestion, Topic};
use crate::services::gemini::{ResponseFormat, TextModel};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
struct FlashcardSet {
    #[validate(length(min = 1, max = 50), nested)]
    flashcards: Vec<Flashcard>,
}

#[derive(Debug, Deserialize, Validate)]
struct QuizSet {
    #[validate(length(min = 1, max = 50), nested)]
    questions: Vec<QuizQuestion>,
}

fn notes_prompt(title: &str) -> String {
    format!(
        "You are a patient tutor. Write concise, well-structured study notes in Markdown \
         on the topic \"{title}\". Use headings, short paragraphs and bullet points. \
         Cover key definitions, core ideas and one worked example. \
         Reply with the notes only."
    )
}

fn flashcards_prompt(title: &str, count: usize) -> String {
    format!(
        "Create exactly {count} study flashcards on the topic \"{title}\". \
         Reply with JSON only, shaped as \
         {{\"flashcards\": [{{\"front\": \"question or term\", \"back\": \"answer\"}}]}}."
    )
}

fn quiz_prompt(title: &str, count: usize) -> String {
    format!(
        "Write a multiple-choice quiz with exactly {count} questions on the topic \"{title}\". \
         Each question has 4 options and one correct answer. Reply with JSON only, shaped as \
         {{\"questions\": [{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \
         \"answer_index\": 0, \"explanation\": \"...\"}}]}}."
    )
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse and validate a JSON reply.
fn parse_reply<T: DeserializeOwned + Validate>(flow: &str, reply: &str) -> Result<T, AppError> {
    let parsed: T = serde_json::from_str(strip_code_fence(reply)).map_err(|e| {
        tracing::warn!(flow, error = %e, reply_len = reply.len(), "Model reply is not valid JSON");
        AppError::Generation(format!("{} reply is not valid JSON: {}", flow, e))
    })?;

    parsed.validate().map_err(|e| {
        tracing::warn!(flow, error = %e, "Model reply failed validation");
        AppError::Generation(format!("{} reply failed validation: {}", flow, e))
    })?;

    Ok(parsed)
}

pub fn parse_flashcards(reply: &str) -> Result<Vec<Flashcard>, AppError> {
    parse_reply::<FlashcardSet>("flashcards", reply).map(|set| set.flashcards)
}

pub fn parse_quiz(reply: &str) -> Result<Vec<QuizQuestion>, AppError> {
    parse_reply::<QuizSet>("quiz", reply).map(|set| set.questions)
}

pub fn parse_notes(reply: &str) -> Result<String, AppError> {
    let notes = strip_code_fence(reply);
    if notes.is_empty() {
        tracing::warn!(flow = "notes", "Model returned empty notes");
        return Err(AppError::Generation("notes reply is empty".to_string()));
    }
    Ok(notes.to_string())
}

/// Requested size of a generated topic.
#[derive(Debug, Clone, Copy)]
pub struct TopicSize {
    pub flashcards: usize,
    pub questions: usize,
}

impl Default for TopicSize {
    fn default() -> Self {
        Self {
            flashcards: 10,
            questions: 5,
        }
    }
}

/// Runs the generation flows against a text model.
#[derive(Clone)]
pub struct StudyGenerator {
    model: Arc<dyn TextModel>,
}

impl StudyGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn notes(&self, title: &str) -> Result<String, AppError> {
        let reply = self
            .model
            .generate(&notes_prompt(title), ResponseFormat::Text)
            .await?;
        parse_notes(&reply)
    }

    pub async fn flashcards(&self, title: &str, count: usize) -> Result<Vec<Flashcard>, AppError> {
        let count = count.clamp(1, MAX_ITEMS_PER_FLOW);
        let reply = self
            .model
            .generate(&flashcards_prompt(title, count), ResponseFormat::Json)
            .await?;
        parse_flashcards(&reply)
    }

    pub async fn quiz(&self, title: &str, count: usize) -> Result<Vec<QuizQuestion>, AppError> {
        let count = count.clamp(1, MAX_ITEMS_PER_FLOW);
        let reply = self
            .model
            .generate(&quiz_prompt(title, count), ResponseFormat::Json)
            .await?;
        parse_quiz(&reply)
    }

    /// Run all three flows for a topic. Any failing flow fails the topic.
    pub async fn topic(&self, uid: &str, title: &str, size: TopicSize) -> Result<Topic, AppError> {
        let (notes, flashcards, quiz) = tokio::try_join!(
            self.notes(title),
            self.flashcards(title, size.flashcards),
            self.quiz(title, size.questions),
        )?;

        tracing::info!(
            uid,
            title,
            flashcards = flashcards.len(),
            questions = quiz.len(),
            "Topic generated"
        );

        Ok(Topic {
            id: uuid::Uuid::new_v4().to_string(),
            uid: uid.to_string(),
            title: title.to_string(),
            notes,
            flashcards,
            quiz,
            created_at: Utc::now(),
        })
    }
}
