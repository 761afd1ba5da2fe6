use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

const TODO_COLUMNS: &str = "id, student_id, title, due_date, completed, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Todo {
    pub id: Uuid,
    pub student_id: Uuid, // Foreign key to Profile
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTodo {
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    /// `Some(None)` clears the due date.
    #[serde(default, with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

impl Todo {
    /// A todo still needs attention until it is marked completed.
    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_student_id(
        pool: &PgPool,
        student_id: Uuid,
        pending_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!(
            r#"SELECT {TODO_COLUMNS}
               FROM todos
               WHERE student_id = $1
                 AND ($2 = FALSE OR completed = FALSE)
               ORDER BY due_date ASC NULLS LAST, created_at ASC"#
        ))
        .bind(student_id)
        .bind(pending_only)
        .fetch_all(pool)
        .await
    }

    /// Pending todos with a due date inside `[start, end]` (both inclusive),
    /// optionally restricted to one student.
    pub async fn find_pending_due_between(
        pool: &PgPool,
        start: NaiveDate,
        end: NaiveDate,
        student_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!(
            r#"SELECT {TODO_COLUMNS}
               FROM todos
               WHERE completed = FALSE
                 AND due_date IS NOT NULL
                 AND due_date >= $1
                 AND due_date <= $2
                 AND ($3::uuid IS NULL OR student_id = $3)
               ORDER BY due_date ASC"#
        ))
        .bind(start)
        .bind(end)
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        student_id: Uuid,
        data: &CreateTodo,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!(
            r#"INSERT INTO todos (id, student_id, title, due_date, completed)
               VALUES ($1, $2, $3, $4, FALSE)
               RETURNING {TODO_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&data.title)
        .bind(data.due_date)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: &UpdateTodo) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let title = data.title.clone().unwrap_or(existing.title);
        let due_date = data.due_date.unwrap_or(existing.due_date);
        let completed = data.completed.unwrap_or(existing.completed);

        sqlx::query_as::<_, Todo>(&format!(
            r#"UPDATE todos
               SET title = $2, due_date = $3, completed = $4, updated_at = now()
               WHERE id = $1
               RETURNING {TODO_COLUMNS}"#
        ))
        .bind(id)
        .bind(title)
        .bind(due_date)
        .bind(completed)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Distinguishes an absent field from an explicit `null` in PATCH bodies.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    async fn insert_todo(
        pool: &PgPool,
        student_id: Uuid,
        title: &str,
        due_date: Option<NaiveDate>,
        completed: bool,
    ) -> Uuid {
        let todo = Todo::create(
            pool,
            student_id,
            &CreateTodo {
                title: title.to_string(),
                due_date,
            },
        )
        .await
        .unwrap();
        if completed {
            let done = UpdateTodo {
                completed: Some(true),
                ..Default::default()
            };
            Todo::update(pool, todo.id, &done).await.unwrap();
        }
        todo.id
    }

    /// Runs against a real Postgres: `DATABASE_URL=... cargo test -p db -- --ignored`.
    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn pending_due_query_matches_window_bounds() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let db = DBService::connect_lazy(&url).unwrap();
        db.run_migrations().await.unwrap();
        let pool = &db.pool;

        let mia = Uuid::new_v4();
        let noah = Uuid::new_v4();
        for (id, name) in [(mia, "Mia"), (noah, "Noah")] {
            sqlx::query("INSERT INTO profiles (id, full_name, email) VALUES ($1, $2, NULL)")
                .bind(id)
                .bind(name)
                .execute(pool)
                .await
                .unwrap();
        }

        let start = NaiveDate::from_ymd_opt(2031, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2031, 3, 17).unwrap();
        let on_start = insert_todo(pool, mia, "start", Some(start), false).await;
        let on_end = insert_todo(pool, mia, "end", Some(end), false).await;
        insert_todo(pool, mia, "before", start.pred_opt(), false).await;
        insert_todo(pool, mia, "after", end.succ_opt(), false).await;
        insert_todo(pool, mia, "done", Some(start), true).await;
        insert_todo(pool, mia, "undated", None, false).await;
        let other = insert_todo(pool, noah, "other", Some(end), false).await;

        let all: Vec<Uuid> = Todo::find_pending_due_between(pool, start, end, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.student_id == mia || t.student_id == noah)
            .map(|t| t.id)
            .collect();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&on_start) && all.contains(&on_end) && all.contains(&other));

        let only_mia: Vec<Uuid> = Todo::find_pending_due_between(pool, start, end, Some(mia))
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(only_mia, vec![on_start, on_end]);

        sqlx::query("DELETE FROM profiles WHERE id = ANY($1)")
            .bind(vec![mia, noah])
            .execute(pool)
            .await
            .unwrap();
    }

    #[test]
    fn update_todo_distinguishes_missing_and_null_due_date() {
        let missing: UpdateTodo = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(missing.due_date, None);
        assert_eq!(missing.completed, Some(true));

        let cleared: UpdateTodo = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let set: UpdateTodo = serde_json::from_str(r#"{"due_date": "2026-11-02"}"#).unwrap();
        assert_eq!(
            set.due_date,
            Some(Some(NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()))
        );
    }
}
