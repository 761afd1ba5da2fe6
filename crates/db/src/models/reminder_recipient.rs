use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

const RECIPIENT_COLUMNS: &str = "id, student_id, email, display_name, notes, created_at";

#[derive(Debug, Error)]
pub enum ReminderRecipientError {
    #[error("duplicate address: {email} already receives reminders for this student")]
    Duplicate { email: String },
    #[error("invalid address: {0}")]
    InvalidEmail(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Extra address (parent, guardian, counselor) that receives a copy of a
/// student's reminder emails.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct ReminderRecipient {
    pub id: Uuid,
    pub student_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReminderRecipient {
    pub email: String,
    pub display_name: Option<String>,
    pub notes: Option<String>,
}

impl CreateReminderRecipient {
    /// Minimal shape check; the provider does the real validation at send time.
    pub fn validate(&self) -> Result<(), ReminderRecipientError> {
        let email = self.email.trim();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(())
        } else {
            Err(ReminderRecipientError::InvalidEmail(self.email.clone()))
        }
    }
}

impl ReminderRecipient {
    pub async fn find_by_student_id(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReminderRecipient>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM reminder_recipients WHERE student_id = $1 ORDER BY created_at ASC"
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_student_ids(
        pool: &PgPool,
        student_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, ReminderRecipient>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM reminder_recipients WHERE student_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(student_ids)
        .fetch_all(pool)
        .await
    }

    /// Insert a new address. The `(student_id, email)` unique constraint is
    /// reported as [`ReminderRecipientError::Duplicate`].
    pub async fn create(
        pool: &PgPool,
        student_id: Uuid,
        data: &CreateReminderRecipient,
    ) -> Result<Self, ReminderRecipientError> {
        data.validate()?;
        let email = data.email.trim().to_string();

        sqlx::query_as::<_, ReminderRecipient>(&format!(
            r#"INSERT INTO reminder_recipients (id, student_id, email, display_name, notes)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {RECIPIENT_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&email)
        .bind(&data.display_name)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ReminderRecipientError::Duplicate { email }
            }
            other => ReminderRecipientError::Database(other),
        })
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminder_recipients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(email: &str) -> CreateReminderRecipient {
        CreateReminderRecipient {
            email: email.to_string(),
            display_name: Some("Parent".to_string()),
            notes: None,
        }
    }

    #[test]
    fn validate_accepts_plain_addresses() {
        assert!(create("parent@example.com").validate().is_ok());
        assert!(create("  parent@example.com ").validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_addresses() {
        for bad in ["", "parent", "@example.com", "parent@localhost", "pa rent@example.com"] {
            assert!(
                matches!(
                    create(bad).validate(),
                    Err(ReminderRecipientError::InvalidEmail(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn duplicate_error_mentions_duplicate_address() {
        let err = ReminderRecipientError::Duplicate {
            email: "parent@example.com".to_string(),
        };
        assert!(err.to_string().starts_with("duplicate address"));
    }
}
