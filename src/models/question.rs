// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'questions' table in the database.
///
/// `correct_index` is the answer key. It must only be read by grading and
/// admin paths; attempt-serving responses use [`PublicQuestion`] instead.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub exam_id: Uuid,

    /// The text content of the question.
    pub text: String,

    /// Ordered list of candidate answers (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index into `options` pointing at the correct answer.
    pub correct_index: i32,
}

/// DTO for serving a question during an attempt (answer key withheld).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(question: Question) -> Self {
        PublicQuestion {
            id: question.id,
            text: question.text,
            options: question.options.0,
        }
    }
}

/// DTO for creating a new question inside an exam.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_correct_index))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_index: i32,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}

fn validate_correct_index(req: &CreateQuestionRequest) -> Result<(), validator::ValidationError> {
    if req.correct_index < 0 || req.correct_index as usize >= req.options.len() {
        return Err(validator::ValidationError::new("correct_index_out_of_range"));
    }
    Ok(())
}
