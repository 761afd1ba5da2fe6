//! Batch job that emails every student a summary of their upcoming todos.
//!
//! One run takes a single snapshot of pending todos, groups it by student,
//! resolves recipients, renders once per student and sends one email per
//! (student, recipient) pair. Per-recipient failures are recorded in the
//! summary and never abort the run; only failing to enumerate todos or
//! profiles does.

use std::{
    collections::HashMap,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use db::models::{profile::Profile, todo::Todo};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    email_provider::{EmailSender, OutboundEmail},
    reminder_recipients::{RecipientDedup, resolve_recipients},
    reminder_store::{ReminderStore, ReminderStoreError},
    reminder_template::{ReminderRenderer, TemplateError},
    reminder_window::{DueWindow, ReminderMode},
};

#[derive(Debug, Error)]
pub enum ReminderJobError {
    #[error("failed to fetch pending todos: {0}")]
    FetchTodos(#[source] ReminderStoreError),
    #[error("failed to fetch student profiles: {0}")]
    FetchProfiles(#[source] ReminderStoreError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderRunRequest {
    pub mode: ReminderMode,
    /// Restrict the run to one student.
    pub student_id: Option<Uuid>,
    /// Include per-recipient details in the summary.
    pub debug: bool,
    /// Send only to this address instead of the resolved recipients.
    pub recipient_override: Option<String>,
    /// Sending domain for this run instead of the configured one.
    pub from_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDetail {
    pub email: String,
    pub student_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecipientDetail {
    fn sent(email: String, student_id: Uuid, message_id: String) -> Self {
        Self {
            email,
            student_id,
            success: true,
            message_id: Some(message_id),
            error: None,
        }
    }

    fn failed(email: String, student_id: Uuid, error: String) -> Self {
        Self {
            email,
            student_id,
            success: false,
            message_id: None,
            error: Some(error),
        }
    }
}

/// Result of one run. Built fresh per invocation, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRunSummary {
    pub success: bool,
    pub mode: ReminderMode,
    pub date_range: DueWindow,
    pub todos_found: usize,
    pub students_processed: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<RecipientDetail>>,
}

/// `From` header identity for outgoing reminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub name: String,
    pub domain: String,
}

impl SenderIdentity {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }

    pub fn from_header(&self, domain_override: Option<&str>) -> String {
        let domain = domain_override
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.domain);
        // The provider's shared test domain only accepts its onboarding mailbox.
        let mailbox = if domain == "resend.dev" {
            "onboarding"
        } else {
            "reminders"
        };
        format!("{} <{mailbox}@{domain}>", self.name)
    }
}

struct Delivery {
    student_id: Uuid,
    email: OutboundEmail,
}

enum Planned {
    Send(Delivery),
    Failed(RecipientDetail),
}

pub struct ReminderJob {
    store: Arc<dyn ReminderStore>,
    mailer: Arc<dyn EmailSender>,
    renderer: ReminderRenderer,
    sender: SenderIdentity,
    dedup: RecipientDedup,
    max_in_flight: usize,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        mailer: Arc<dyn EmailSender>,
        sender: SenderIdentity,
    ) -> Result<Self, ReminderJobError> {
        Ok(Self {
            store,
            mailer,
            renderer: ReminderRenderer::new()?,
            sender,
            dedup: RecipientDedup::default(),
            max_in_flight: 1,
        })
    }

    pub fn with_dedup(mut self, dedup: RecipientDedup) -> Self {
        self.dedup = dedup;
        self
    }

    /// Cap on concurrent provider calls. 1 sends strictly one after another.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub async fn student_exists(&self, student_id: Uuid) -> Result<bool, ReminderJobError> {
        let profiles = self
            .store
            .profiles_for(&[student_id])
            .await
            .map_err(ReminderJobError::FetchProfiles)?;
        Ok(!profiles.is_empty())
    }

    pub async fn run(
        &self,
        request: &ReminderRunRequest,
        now: DateTime<Utc>,
    ) -> Result<ReminderRunSummary, ReminderJobError> {
        let window = DueWindow::for_mode(request.mode, now);
        info!(
            mode = %request.mode,
            start = %window.start,
            end = %window.end,
            student_id = ?request.student_id,
            "Reminder run started"
        );

        let todos = self
            .store
            .pending_todos_in(window, request.student_id)
            .await
            .map_err(ReminderJobError::FetchTodos)?;

        let (order, by_student) = group_by_student(&todos);
        let mut summary = ReminderRunSummary {
            success: true,
            mode: request.mode,
            date_range: window,
            todos_found: todos.len(),
            students_processed: order.len(),
            emails_sent: 0,
            emails_failed: 0,
            details: None,
        };

        if todos.is_empty() {
            info!(mode = %request.mode, "Reminder run found no pending todos");
            if request.debug {
                summary.details = Some(Vec::new());
            }
            return Ok(summary);
        }

        let profiles: HashMap<Uuid, Profile> = self
            .store
            .profiles_for(&order)
            .await
            .map_err(ReminderJobError::FetchProfiles)?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        // A present override always replaces resolution; a blank one leaves nobody to send to.
        let recipients = match request.recipient_override.as_deref().map(str::trim) {
            Some(address) => order
                .iter()
                .map(|id| {
                    let addresses = if address.is_empty() {
                        Vec::new()
                    } else {
                        vec![address.to_string()]
                    };
                    (*id, addresses)
                })
                .collect(),
            None => resolve_recipients(self.store.as_ref(), &profiles, self.dedup).await,
        };

        let from = self.sender.from_header(request.from_domain.as_deref());
        let planned = self.plan_deliveries(
            &order,
            &by_student,
            &profiles,
            &recipients,
            &from,
            request.mode,
            now,
        );

        let details: Vec<RecipientDetail> = stream::iter(planned)
            .map(|planned| async move {
                match planned {
                    Planned::Send(delivery) => self.deliver(delivery).await,
                    Planned::Failed(detail) => detail,
                }
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        summary.emails_sent = details.iter().filter(|d| d.success).count();
        summary.emails_failed = details.len() - summary.emails_sent;
        if request.debug {
            summary.details = Some(details);
        }

        info!(
            mode = %summary.mode,
            todos_found = summary.todos_found,
            students_processed = summary.students_processed,
            emails_sent = summary.emails_sent,
            emails_failed = summary.emails_failed,
            "Reminder run finished"
        );

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_deliveries(
        &self,
        order: &[Uuid],
        by_student: &HashMap<Uuid, Vec<Todo>>,
        profiles: &HashMap<Uuid, Profile>,
        recipients: &HashMap<Uuid, Vec<String>>,
        from: &str,
        mode: ReminderMode,
        now: DateTime<Utc>,
    ) -> Vec<Planned> {
        let mut planned = Vec::new();

        for student_id in order {
            let addresses = recipients.get(student_id).cloned().unwrap_or_default();
            if addresses.is_empty() {
                warn!(
                    student_id = %student_id,
                    "No reminder addresses for student, skipping"
                );
                continue;
            }

            let name = profiles
                .get(student_id)
                .map(Profile::display_name)
                .unwrap_or("Student");
            let todos = by_student.get(student_id).map(Vec::as_slice).unwrap_or(&[]);

            match self.renderer.render(name, todos, mode, now) {
                Ok(rendered) => {
                    debug!(
                        student_id = %student_id,
                        todos = todos.len(),
                        recipients = addresses.len(),
                        "Rendered reminder"
                    );
                    for address in addresses {
                        planned.push(Planned::Send(Delivery {
                            student_id: *student_id,
                            email: OutboundEmail {
                                from: from.to_string(),
                                to: vec![address],
                                subject: rendered.subject.clone(),
                                html: rendered.html.clone(),
                                text: rendered.text.clone(),
                            },
                        }));
                    }
                }
                Err(e) => {
                    warn!(student_id = %student_id, error = %e, "Failed to render reminder");
                    for address in addresses {
                        planned.push(Planned::Failed(RecipientDetail::failed(
                            address,
                            *student_id,
                            e.to_string(),
                        )));
                    }
                }
            }
        }

        planned
    }

    async fn deliver(&self, delivery: Delivery) -> RecipientDetail {
        let Delivery { student_id, email } = delivery;
        let address = email.to.first().cloned().unwrap_or_default();

        match self.mailer.send(&email).await {
            Ok(receipt) => {
                debug!(student_id = %student_id, email = %address, message_id = %receipt.id, "Reminder sent");
                RecipientDetail::sent(address, student_id, receipt.id)
            }
            Err(e) => {
                warn!(student_id = %student_id, email = %address, error = %e, "Reminder send failed");
                RecipientDetail::failed(address, student_id, e.to_string())
            }
        }
    }
}

/// Students in order of first appearance in the snapshot, plus their todos.
fn group_by_student(todos: &[Todo]) -> (Vec<Uuid>, HashMap<Uuid, Vec<Todo>>) {
    let mut order = Vec::new();
    let mut by_student: HashMap<Uuid, Vec<Todo>> = HashMap::new();

    for todo in todos {
        let entry = by_student.entry(todo.student_id).or_insert_with(|| {
            order.push(todo.student_id);
            Vec::new()
        });
        entry.push(todo.clone());
    }

    (order, by_student)
}
