// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::question::CreateQuestionRequest;

/// Represents the 'exams' table in the database.
///
/// `security_key` is a gating passphrase, not a credential. It is never
/// serialized; clients only ever see the derived `has_security_key` flag.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: i32,

    /// Optional availability window. Absent means always available.
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Whether the student is routed to the result review after submitting.
    pub show_result: bool,
    pub randomize_questions: bool,

    /// Activates proctoring (fullscreen, tab-visibility, navigation blocking).
    pub security_enabled: bool,

    #[serde(skip_serializing, default)]
    pub security_key: String,

    pub category: String,
    pub is_hidden: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// DTO served to attempt clients: strips the key, exposes only its presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicExam {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub show_result: bool,
    pub randomize_questions: bool,
    pub security_enabled: bool,
    pub has_security_key: bool,
    pub category: String,
}

impl From<Exam> for PublicExam {
    fn from(exam: Exam) -> Self {
        PublicExam {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            time_limit_minutes: exam.time_limit_minutes,
            start_time: exam.start_time,
            end_time: exam.end_time,
            show_result: exam.show_result,
            randomize_questions: exam.randomize_questions,
            security_enabled: exam.security_enabled,
            has_security_key: !exam.security_key.is_empty(),
            category: exam.category,
        }
    }
}

/// DTO for creating a new exam together with its question set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub show_result: Option<bool>,
    pub randomize_questions: Option<bool>,
    pub security_enabled: Option<bool>,
    #[validate(length(max = 100))]
    pub security_key: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub is_hidden: Option<bool>,
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// Payload for POST /api/exams/{id}/verify-key.
#[derive(Debug, Deserialize)]
pub struct VerifyKeyRequest {
    pub key: String,
}
