// src/handlers/result.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    grading,
    models::{
        exam::Exam,
        question::Question,
        result::{ExamResult, SubmitExamRequest},
        session::Session,
    },
};

const RESULT_COLUMNS: &str = "id, exam_id, student_id, session_id, exam_title, total_questions, \
     correct, wrong, score, answers, created_at, updated_at";

/// Submission Processor: grades a submitted answer set against the
/// authoritative question data and merges it into the student's
/// permanent result.
///
/// The merge is a single conditional upsert, so two near-simultaneous
/// submissions for the same (exam, student) cannot interleave into a
/// lost update: a row is only written when the incoming score is at
/// least the stored one.
pub async fn submit_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session: Session = sqlx::query_as(
        "SELECT id, student_id, name, reg_no, expires_at, created_at \
         FROM sessions WHERE id = $1",
    )
    .bind(payload.session_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError("Invalid or expired session".to_string()))?;

    // The row may still exist after its logical expiry; re-check.
    if session.is_expired(Utc::now()) {
        return Err(AppError::AuthError("Session expired".to_string()));
    }

    let exam: Exam = sqlx::query_as(
        "SELECT id, title, description, time_limit_minutes, start_time, end_time, show_result, \
             randomize_questions, security_enabled, security_key, category, is_hidden, created_at \
         FROM exams WHERE id = $1",
    )
    .bind(payload.exam_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions: Vec<Question> = sqlx::query_as(
        "SELECT id, exam_id, text, options, correct_index FROM questions WHERE exam_id = $1",
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    let graded = grading::grade(&questions, &payload.answers);

    // Conditional upsert: only a score >= the stored one replaces the
    // row. RETURNING yields nothing when the guard rejects the write,
    // in which case the stored best result is returned unchanged.
    let merged: Option<ExamResult> = sqlx::query_as(&format!(
        "INSERT INTO results (id, exam_id, student_id, session_id, exam_title, total_questions, \
             correct, wrong, score, answers) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (exam_id, student_id) DO UPDATE SET \
             session_id = EXCLUDED.session_id, \
             exam_title = EXCLUDED.exam_title, \
             total_questions = EXCLUDED.total_questions, \
             correct = EXCLUDED.correct, \
             wrong = EXCLUDED.wrong, \
             score = EXCLUDED.score, \
             answers = EXCLUDED.answers, \
             updated_at = NOW() \
         WHERE results.score <= EXCLUDED.score \
         RETURNING {}",
        RESULT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(exam.id)
    .bind(session.student_id)
    .bind(session.id)
    .bind(&exam.title)
    .bind(graded.total_questions)
    .bind(graded.correct)
    .bind(graded.wrong)
    .bind(graded.score)
    .bind(sqlx::types::Json(&graded.details))
    .fetch_optional(&pool)
    .await?;

    let result = match merged {
        Some(result) => result,
        None => {
            // Lower score than the stored best: the existing result is
            // authoritative.
            sqlx::query_as(&format!(
                "SELECT {} FROM results WHERE exam_id = $1 AND student_id = $2",
                RESULT_COLUMNS
            ))
            .bind(exam.id)
            .bind(session.student_id)
            .fetch_one(&pool)
            .await?
        }
    };

    record_attendance(&pool, session.student_id).await;

    Ok(Json(result))
}

/// Marks the student present for the current calendar day. Idempotent,
/// and failures never abort the grading path.
async fn record_attendance(pool: &PgPool, student_id: Uuid) {
    let outcome = sqlx::query(
        "INSERT INTO attendance (student_id, date) VALUES ($1, CURRENT_DATE) \
         ON CONFLICT (student_id, date) DO NOTHING",
    )
    .bind(student_id)
    .execute(pool)
    .await;

    if let Err(e) = outcome {
        tracing::warn!("Failed to record attendance for {}: {:?}", student_id, e);
    }
}

/// Fetches one result with its per-question detail for the review screen.
pub async fn get_result(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result: ExamResult = sqlx::query_as(&format!(
        "SELECT {} FROM results WHERE id = $1",
        RESULT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    Ok(Json(result))
}

/// All results for the session's student, newest first.
pub async fn get_session_results(
    State(pool): State<PgPool>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session: Session = sqlx::query_as(
        "SELECT id, student_id, name, reg_no, expires_at, created_at \
         FROM sessions WHERE id = $1",
    )
    .bind(session_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found or expired".to_string()))?;

    let results: Vec<ExamResult> = sqlx::query_as(&format!(
        "SELECT {} FROM results WHERE student_id = $1 ORDER BY updated_at DESC",
        RESULT_COLUMNS
    ))
    .bind(session.student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
