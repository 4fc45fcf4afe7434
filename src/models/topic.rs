// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study topics produced by the AI generation flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Most flashcards or quiz questions a single flow may return.
pub const MAX_ITEMS_PER_FLOW: usize = 50;

/// A generated topic stored at `topics/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Topic {
    pub id: String,
    pub uid: String,
    pub title: String,
    /// Markdown study notes
    pub notes: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Flashcard {
    #[validate(length(min = 1, max = 500))]
    pub front: String,
    #[validate(length(min = 1, max = 2000))]
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[validate(schema(function = "validate_answer_index"))]
pub struct QuizQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(length(min = 2, max = 6))]
    pub options: Vec<String>,
    pub answer_index: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

fn validate_answer_index(question: &QuizQuestion) -> Result<(), ValidationError> {
    if question.answer_index >= question.options.len() {
        return Err(ValidationError::new("answer_index_out_of_range"));
    }
    if question.options.iter().any(|o| o.trim().is_empty()) {
        return Err(ValidationError::new("empty_option"));
    }
    Ok(())
}
