// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'sessions' table: a short-lived binding of a display
/// name / registration number to a student identity.
///
/// A session authorizes submission. Expiry is re-checked at submission
/// time even if the row still physically exists.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub student_id: Uuid,
    pub name: String,
    pub reg_no: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// DTO for POST /api/sessions/start.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub reg_no: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Credential handed back to the client after session bootstrap.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub name: String,
    pub reg_no: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            name: "Asha".to_string(),
            reg_no: "R-001".to_string(),
            expires_at,
            created_at: None,
        }
    }

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        assert!(!session(now).is_expired(now));
        assert!(!session(now + Duration::minutes(1)).is_expired(now));
        assert!(session(now - Duration::seconds(1)).is_expired(now));
    }
}
