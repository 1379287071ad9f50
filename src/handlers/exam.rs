// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{CreateExamRequest, Exam, PublicExam, VerifyKeyRequest},
        question::{PublicQuestion, Question},
    },
};

const EXAM_COLUMNS: &str = "id, title, description, time_limit_minutes, start_time, end_time, \
     show_result, randomize_questions, security_enabled, security_key, category, is_hidden, \
     created_at";

#[derive(Debug, Deserialize)]
pub struct ListExamsParams {
    pub category: Option<String>,
}

/// Lists visible exams for students. Hidden exams are excluded and the
/// security key is never serialized; clients get `has_security_key`.
pub async fn list_exams(
    State(pool): State<PgPool>,
    Query(params): Query<ListExamsParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM exams WHERE is_hidden = FALSE",
        EXAM_COLUMNS
    ));
    if let Some(category) = &params.category {
        query.push(" AND category = ").push_bind(category);
    }
    query.push(" ORDER BY created_at DESC");

    let exams: Vec<Exam> = query.build_query_as().fetch_all(&pool).await?;

    let public: Vec<PublicExam> = exams.into_iter().map(PublicExam::from).collect();
    Ok(Json(public))
}

/// Creates an exam together with its question set in one transaction.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    let exam_id = Uuid::new_v4();
    let exam: Exam = sqlx::query_as(&format!(
        "INSERT INTO exams (id, title, description, time_limit_minutes, start_time, end_time, \
             show_result, randomize_questions, security_enabled, security_key, category, is_hidden) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {}",
        EXAM_COLUMNS
    ))
    .bind(exam_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_limit_minutes)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.show_result.unwrap_or(true))
    .bind(payload.randomize_questions.unwrap_or(false))
    .bind(payload.security_enabled.unwrap_or(false))
    .bind(payload.security_key.as_deref().unwrap_or(""))
    .bind(payload.category.as_deref().unwrap_or("All Exam"))
    .bind(payload.is_hidden.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await?;

    for question in &payload.questions {
        sqlx::query(
            "INSERT INTO questions (id, exam_id, text, options, correct_index) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(exam_id)
        .bind(&question.text)
        .bind(sqlx::types::Json(&question.options))
        .bind(question.correct_index)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!("Created exam '{}' ({})", exam.title, exam.id);
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Response for GET /api/exams/{id}: the exam plus its questions, with
/// `correct_index` and `security_key` withheld.
#[derive(Debug, serde::Serialize)]
pub struct ExamWithQuestions {
    pub exam: PublicExam,
    pub questions: Vec<PublicQuestion>,
}

pub async fn get_exam(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let exam: Exam = sqlx::query_as(&format!(
        "SELECT {} FROM exams WHERE id = $1",
        EXAM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions: Vec<Question> = sqlx::query_as(
        "SELECT id, exam_id, text, options, correct_index FROM questions WHERE exam_id = $1",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(ExamWithQuestions {
        exam: PublicExam::from(exam),
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }))
}

/// Checks the gating key for a security-enabled exam. An exam with no
/// stored key verifies trivially.
pub async fn verify_key(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let security_key: String = sqlx::query_scalar("SELECT security_key FROM exams WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let success = security_key.is_empty() || security_key == payload.key;
    Ok(Json(serde_json::json!({ "success": success })))
}
