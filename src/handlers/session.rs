// src/handlers/session.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        session::{SessionResponse, StartSessionRequest},
        student::Student,
    },
};

/// Bootstraps a student session: upserts the student by registration
/// number and issues a time-limited session the Submission Processor
/// accepts as authorization.
pub async fn start_session(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let reg_no = payload.reg_no.trim().to_uppercase();

    // Single atomic upsert so two simultaneous starts for the same
    // registration number cannot race into a duplicate student row.
    let student: Student = sqlx::query_as(
        "INSERT INTO students (id, reg_no, name, email) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (reg_no) DO UPDATE SET \
             name = EXCLUDED.name, \
             email = COALESCE(EXCLUDED.email, students.email) \
         RETURNING id, reg_no, name, email, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&reg_no)
    .bind(payload.name.trim())
    .bind(payload.email.as_deref())
    .fetch_one(&pool)
    .await?;

    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::minutes(config.session_ttl_minutes);

    sqlx::query(
        "INSERT INTO sessions (id, student_id, name, reg_no, expires_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(session_id)
    .bind(student.id)
    .bind(&student.name)
    .bind(&student.reg_no)
    .bind(expires_at)
    .execute(&pool)
    .await?;

    tracing::info!("Started session {} for student {}", session_id, student.reg_no);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            student_id: student.id,
            name: student.name,
            reg_no: student.reg_no,
            expires_at,
        }),
    ))
}
