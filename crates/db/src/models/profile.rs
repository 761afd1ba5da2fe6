use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl Profile {
    /// Name used to greet the student; falls back to a neutral salutation.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Student")
    }

    /// Profile email, if one is set and not blank.
    pub fn contact_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.trim().is_empty())
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Profile>(
            "SELECT id, full_name, email FROM profiles WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(full_name: Option<&str>, email: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: full_name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn display_name_falls_back_when_blank() {
        assert_eq!(profile(Some("Mia Chen"), None).display_name(), "Mia Chen");
        assert_eq!(profile(Some("   "), None).display_name(), "Student");
        assert_eq!(profile(None, None).display_name(), "Student");
    }

    #[test]
    fn contact_email_ignores_blank_values() {
        assert_eq!(
            profile(None, Some("mia@example.com")).contact_email(),
            Some("mia@example.com")
        );
        assert_eq!(profile(None, Some("")).contact_email(), None);
        assert_eq!(profile(None, Some("  ")).contact_email(), None);
        assert_eq!(profile(None, None).contact_email(), None);
    }
}
