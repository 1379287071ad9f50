// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;

/// Per-question grading detail stored inside a result's `answers` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub question_id: Uuid,
    pub selected_index: i32,
    pub correct_index: i32,
    pub is_correct: bool,
}

/// Represents the 'results' table: one permanent row per (exam, student).
///
/// Rows are only ever replaced by a submission whose score is greater than
/// or equal to the stored one; a worse retake never degrades the record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub exam_title: String,
    pub total_questions: i32,
    pub correct: i32,
    pub wrong: i32,
    pub score: i32,
    pub answers: Json<Vec<AnswerDetail>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One submitted answer: the question and the option the student picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub selected_index: i32,
}

/// Payload for POST /api/results/submit.
/// Unanswered questions are simply absent from `answers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitExamRequest {
    pub exam_id: Uuid,
    pub session_id: Uuid,
    pub answers: Vec<SubmittedAnswer>,
}
