//! In-memory fakes for the reminder job's store and email provider.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use db::models::{profile::Profile, reminder_recipient::ReminderRecipient, todo::Todo};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::services::{
    email_provider::{EmailProviderError, EmailSender, OutboundEmail, SendReceipt},
    reminder_store::{ReminderStore, ReminderStoreError},
    reminder_window::DueWindow,
};

#[derive(Debug, Default)]
pub struct InMemoryReminderStore {
    todos: Vec<Todo>,
    profiles: Vec<Profile>,
    recipients: Vec<ReminderRecipient>,
    fail_todos: bool,
    fail_profiles: bool,
    fail_recipients: bool,
    todo_queries: AtomicUsize,
}

impl InMemoryReminderStore {
    pub fn with_todo(mut self, todo: Todo) -> Self {
        self.todos.push(todo);
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn with_recipient(mut self, recipient: ReminderRecipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn failing_todo_lookup(mut self) -> Self {
        self.fail_todos = true;
        self
    }

    pub fn failing_profile_lookup(mut self) -> Self {
        self.fail_profiles = true;
        self
    }

    pub fn failing_recipient_lookup(mut self) -> Self {
        self.fail_recipients = true;
        self
    }

    /// Number of times pending todos were fetched.
    pub fn todo_queries(&self) -> usize {
        self.todo_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn pending_todos_in(
        &self,
        window: DueWindow,
        student_id: Option<Uuid>,
    ) -> Result<Vec<Todo>, ReminderStoreError> {
        self.todo_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_todos {
            return Err(ReminderStoreError::Unavailable("todos table unreachable".to_string()));
        }

        let mut todos: Vec<Todo> = self
            .todos
            .iter()
            .filter(|todo| window.admits(todo))
            .filter(|todo| student_id.is_none_or(|id| todo.student_id == id))
            .cloned()
            .collect();
        todos.sort_by_key(|todo| todo.due_date);
        Ok(todos)
    }

    async fn profiles_for(&self, student_ids: &[Uuid]) -> Result<Vec<Profile>, ReminderStoreError> {
        if self.fail_profiles {
            return Err(ReminderStoreError::Unavailable("profiles table unreachable".to_string()));
        }

        Ok(self
            .profiles
            .iter()
            .filter(|profile| student_ids.contains(&profile.id))
            .cloned()
            .collect())
    }

    async fn reminder_recipients_for(
        &self,
        student_ids: &[Uuid],
    ) -> Result<Vec<ReminderRecipient>, ReminderStoreError> {
        if self.fail_recipients {
            return Err(ReminderStoreError::Unavailable(
                "reminder_recipients table unreachable".to_string(),
            ));
        }

        Ok(self
            .recipients
            .iter()
            .filter(|recipient| student_ids.contains(&recipient.student_id))
            .cloned()
            .collect())
    }
}

/// Records every email it is asked to send; configured addresses fail.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<OutboundEmail>>,
    failures: HashMap<String, EmailProviderError>,
}

impl RecordingEmailSender {
    pub fn failing_for(mut self, address: &str, error: EmailProviderError) -> Self {
        self.failures.insert(address.to_string(), error);
        self
    }

    /// Successfully sent emails, in send order.
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, EmailProviderError> {
        if let Some(error) = email.to.iter().find_map(|to| self.failures.get(to)) {
            return Err(error.clone());
        }

        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        Ok(SendReceipt {
            id: format!("msg_{}", sent.len()),
        })
    }
}
