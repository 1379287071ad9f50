// src/models/student.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'students' table. Registration numbers are unique and
/// stored uppercase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub reg_no: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
