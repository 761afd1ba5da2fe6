//! Read-only data access used by the reminder job.

use async_trait::async_trait;
use db::{
    DBService,
    models::{profile::Profile, reminder_recipient::ReminderRecipient, todo::Todo},
};
use thiserror::Error;
use uuid::Uuid;

use super::reminder_window::DueWindow;

#[derive(Debug, Error)]
pub enum ReminderStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Pending todos with a due date inside `window`, optionally for one student.
    async fn pending_todos_in(
        &self,
        window: DueWindow,
        student_id: Option<Uuid>,
    ) -> Result<Vec<Todo>, ReminderStoreError>;

    async fn profiles_for(&self, student_ids: &[Uuid]) -> Result<Vec<Profile>, ReminderStoreError>;

    async fn reminder_recipients_for(
        &self,
        student_ids: &[Uuid],
    ) -> Result<Vec<ReminderRecipient>, ReminderStoreError>;
}

#[async_trait]
impl ReminderStore for DBService {
    async fn pending_todos_in(
        &self,
        window: DueWindow,
        student_id: Option<Uuid>,
    ) -> Result<Vec<Todo>, ReminderStoreError> {
        Ok(Todo::find_pending_due_between(&self.pool, window.start, window.end, student_id).await?)
    }

    async fn profiles_for(&self, student_ids: &[Uuid]) -> Result<Vec<Profile>, ReminderStoreError> {
        Ok(Profile::find_by_ids(&self.pool, student_ids).await?)
    }

    async fn reminder_recipients_for(
        &self,
        student_ids: &[Uuid],
    ) -> Result<Vec<ReminderRecipient>, ReminderStoreError> {
        Ok(ReminderRecipient::find_by_student_ids(&self.pool, student_ids).await?)
    }
}
