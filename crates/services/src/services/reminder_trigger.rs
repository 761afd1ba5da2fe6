//! Operator-side "send test reminder" action and its user feedback.
//!
//! The classification of outcomes is kept free of any UI so the same logic
//! can back an interactive toast or a scheduled caller that only logs.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{reminder_job::ReminderRunSummary, reminder_window::ReminderMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackKind {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub title: String,
    pub message: String,
}

impl Feedback {
    fn new(kind: FeedbackKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Where feedback ends up: a toast, a log line, a test recorder.
pub trait FeedbackReporter: Send + Sync {
    fn loading(&self, _message: &str) {}

    fn report(&self, feedback: &Feedback);
}

/// Reporter for non-interactive callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FeedbackReporter for TracingReporter {
    fn loading(&self, message: &str) {
        info!("{}", message);
    }

    fn report(&self, feedback: &Feedback) {
        match feedback.kind {
            FeedbackKind::Success | FeedbackKind::Info => {
                info!(kind = %feedback.kind, "{}: {}", feedback.title, feedback.message)
            }
            FeedbackKind::Warning => {
                warn!(kind = %feedback.kind, "{}: {}", feedback.title, feedback.message)
            }
            FeedbackKind::Error => {
                error!(kind = %feedback.kind, "{}: {}", feedback.title, feedback.message)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("a recipient email address is required")]
    MissingRecipient,
    #[error("the student has no pending tasks")]
    NoPendingTasks,
}

/// Body of the manual single-student trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManualReminderRequest {
    pub student_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_email: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReminderMode>,
}

/// Body-level failure returned by the manual trigger with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TriggerResponse {
    Failed(TriggerFailure),
    Completed(ReminderRunSummary),
}

/// What happened to one trigger request, before it is turned into feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// The function endpoint could not be reached (platform asleep, network down).
    Unreachable(String),
    /// The endpoint answered with an application-level error.
    Rejected(String),
    Completed(ReminderRunSummary),
}

pub fn feedback_for_outcome(outcome: &TriggerOutcome) -> Feedback {
    match outcome {
        TriggerOutcome::Unreachable(reason) => Feedback::new(
            FeedbackKind::Error,
            "Reminder service unreachable",
            format!(
                "Could not reach the reminder function ({reason}). The hosting platform may be inactive or the network is down; try again in a minute."
            ),
        ),
        TriggerOutcome::Rejected(message) => rejected_feedback(message),
        TriggerOutcome::Completed(summary) => feedback_for_summary(summary),
    }
}

/// Feedback for a finished run, shared by interactive and scheduled callers.
pub fn feedback_for_summary(summary: &ReminderRunSummary) -> Feedback {
    if summary.todos_found == 0 {
        return Feedback::new(
            FeedbackKind::Info,
            "No pending tasks",
            format!(
                "No pending tasks due between {} and {}; nothing was sent.",
                summary.date_range.start, summary.date_range.end
            ),
        );
    }

    let sent_to: Vec<&str> = summary
        .details
        .iter()
        .flatten()
        .filter(|d| d.success)
        .map(|d| d.email.as_str())
        .collect();
    let first_error = summary
        .details
        .iter()
        .flatten()
        .find_map(|d| d.error.as_deref());

    match (summary.emails_sent, summary.emails_failed) {
        (0, 0) => Feedback::new(
            FeedbackKind::Warning,
            "No recipients",
            "Pending tasks were found but no email address is on file for the student.",
        ),
        (sent, 0) => Feedback::new(
            FeedbackKind::Success,
            "Reminder sent",
            with_recipients(format!("Sent {sent} reminder email(s)."), &sent_to),
        ),
        (0, failed) => match first_error {
            Some(error) if is_domain_error(error) => domain_feedback(error),
            Some(error) => Feedback::new(
                FeedbackKind::Error,
                "Reminder failed",
                format!("All {failed} email(s) failed: {error}. {}", hint_for(error)),
            ),
            None => Feedback::new(
                FeedbackKind::Error,
                "Reminder failed",
                format!(
                    "All {failed} email(s) failed. Check the email provider API key and the sending domain."
                ),
            ),
        },
        (sent, failed) if summary.details.is_none() => Feedback::new(
            FeedbackKind::Warning,
            "Reminder partially sent",
            format!("Sent {sent}, failed {failed}. Per-recipient results were not returned."),
        ),
        (sent, failed) => Feedback::new(
            FeedbackKind::Warning,
            "Reminder partially sent",
            with_recipients(
                format!(
                    "Sent {sent}, failed {failed}{}.",
                    first_error.map(|e| format!(" ({e})")).unwrap_or_default()
                ),
                &sent_to,
            ),
        ),
    }
}

fn rejected_feedback(message: &str) -> Feedback {
    if is_domain_error(message) {
        return domain_feedback(message);
    }
    Feedback::new(
        FeedbackKind::Error,
        "Reminder failed",
        format!("{message}. {}", hint_for(message)),
    )
}

fn domain_feedback(error: &str) -> Feedback {
    Feedback::new(
        FeedbackKind::Warning,
        "Sending domain not verified",
        format!(
            "The email provider refused the sender ({error}). Verify the sending domain, or send only to the account owner's address while testing."
        ),
    )
}

fn with_recipients(message: String, sent_to: &[&str]) -> String {
    if sent_to.is_empty() {
        message
    } else {
        format!("{message} Delivered to: {}.", sent_to.join(", "))
    }
}

fn is_domain_error(error: &str) -> bool {
    let lower = error.to_ascii_lowercase();
    (lower.contains("domain") && (lower.contains("verif") || lower.contains("not allowed")))
        || lower.contains("testing emails")
}

fn hint_for(error: &str) -> &'static str {
    let lower = error.to_ascii_lowercase();
    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401") {
        "Check the email provider API key."
    } else if lower.contains("configuration") {
        "Check the function's environment configuration."
    } else {
        "Check the function logs for details."
    }
}

/// HTTP client for the manual trigger endpoint.
#[derive(Debug, Clone)]
pub struct ReminderTriggerClient {
    http: Client,
    endpoint: String,
    auth_token: Option<SecretString>,
}

impl ReminderTriggerClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<SecretString>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("todo-reminders-trigger/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            auth_token,
        })
    }

    /// Validate, send, classify, report. Returns the feedback that was reported.
    ///
    /// The checked address is the one the run will use: `custom_email` when
    /// present, otherwise the student's profile address. Per-recipient details
    /// are always requested so the feedback can name who received the email.
    pub async fn send_test_reminder(
        &self,
        request: &ManualReminderRequest,
        profile_email: Option<&str>,
        pending_tasks: usize,
        reporter: &dyn FeedbackReporter,
    ) -> Feedback {
        let recipient = match request.custom_email.as_deref() {
            Some(custom) => Some(custom),
            None => profile_email,
        };

        let feedback = match validate(recipient, pending_tasks) {
            Err(TriggerError::MissingRecipient) => Feedback::new(
                FeedbackKind::Error,
                "Missing recipient",
                TriggerError::MissingRecipient.to_string(),
            ),
            Err(TriggerError::NoPendingTasks) => Feedback::new(
                FeedbackKind::Info,
                "No pending tasks",
                TriggerError::NoPendingTasks.to_string(),
            ),
            Ok(()) => {
                reporter.loading("Sending test reminder...");
                let request = ManualReminderRequest {
                    debug: true,
                    ..request.clone()
                };
                let outcome = self.post(&request).await;
                feedback_for_outcome(&outcome)
            }
        };

        reporter.report(&feedback);
        feedback
    }

    async fn post(&self, request: &ManualReminderRequest) -> TriggerOutcome {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let res = match builder.send().await {
            Ok(res) => res,
            Err(e) => return TriggerOutcome::Unreachable(e.to_string()),
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(body) => body,
            Err(e) => return TriggerOutcome::Unreachable(e.to_string()),
        };

        classify_response(status, &body)
    }
}

pub fn validate(recipient: Option<&str>, pending_tasks: usize) -> Result<(), TriggerError> {
    if recipient.is_none_or(|r| r.trim().is_empty()) {
        return Err(TriggerError::MissingRecipient);
    }
    if pending_tasks == 0 {
        return Err(TriggerError::NoPendingTasks);
    }
    Ok(())
}

/// Map a raw endpoint response to an outcome.
pub fn classify_response(status: StatusCode, body: &str) -> TriggerOutcome {
    match serde_json::from_str::<TriggerResponse>(body) {
        Ok(TriggerResponse::Failed(failure)) => {
            TriggerOutcome::Rejected(failure.message.unwrap_or(failure.error))
        }
        Ok(TriggerResponse::Completed(summary)) if status.is_success() => {
            TriggerOutcome::Completed(summary)
        }
        _ if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) =>
        {
            TriggerOutcome::Unreachable(format!("http {}", status.as_u16()))
        }
        _ => TriggerOutcome::Rejected(format!(
            "unexpected response (http {}): {}",
            status.as_u16(),
            body.chars().take(200).collect::<String>()
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::services::{reminder_job::RecipientDetail, reminder_window::DueWindow};

    fn summary(todos: usize, details: Vec<(&str, Result<&str, &str>)>) -> ReminderRunSummary {
        let details: Vec<RecipientDetail> = details
            .into_iter()
            .map(|(email, result)| RecipientDetail {
                email: email.to_string(),
                student_id: Uuid::nil(),
                success: result.is_ok(),
                message_id: result.ok().map(str::to_string),
                error: result.err().map(str::to_string),
            })
            .collect();
        let sent = details.iter().filter(|d| d.success).count();

        ReminderRunSummary {
            success: true,
            mode: ReminderMode::Weekly,
            date_range: DueWindow {
                start: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
                end: NaiveDate::from_ymd_opt(2026, 10, 24).unwrap(),
            },
            todos_found: todos,
            students_processed: usize::from(todos > 0),
            emails_sent: sent,
            emails_failed: details.len() - sent,
            details: Some(details),
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl FeedbackReporter for RecordingReporter {
        fn loading(&self, message: &str) {
            self.events.lock().unwrap().push(format!("loading: {message}"));
        }

        fn report(&self, feedback: &Feedback) {
            self.events.lock().unwrap().push(feedback.kind.to_string());
        }
    }

    #[test]
    fn no_pending_tasks_is_info_not_error() {
        let feedback = feedback_for_summary(&summary(0, vec![]));
        assert_eq!(feedback.kind, FeedbackKind::Info);
    }

    #[test]
    fn all_sent_is_success_and_lists_recipients() {
        let feedback = feedback_for_summary(&summary(
            2,
            vec![("mia@example.com", Ok("m1")), ("mom@example.com", Ok("m2"))],
        ));
        assert_eq!(feedback.kind, FeedbackKind::Success);
        assert!(feedback.message.contains("mia@example.com, mom@example.com"));
    }

    #[test]
    fn partial_failure_is_warning_with_successful_recipients() {
        let feedback = feedback_for_summary(&summary(
            1,
            vec![
                ("mia@example.com", Ok("m1")),
                ("mom@example.com", Err("http 422: invalid recipient")),
            ],
        ));
        assert_eq!(feedback.kind, FeedbackKind::Warning);
        assert!(feedback.message.contains("mia@example.com"));
        assert!(feedback.message.contains("invalid recipient"));
    }

    #[test]
    fn total_failure_is_error_with_api_key_hint() {
        let feedback = feedback_for_summary(&summary(
            1,
            vec![("mia@example.com", Err("invalid api key: API key is invalid"))],
        ));
        assert_eq!(feedback.kind, FeedbackKind::Error);
        assert!(feedback.message.contains("Check the email provider API key"));
    }

    #[test]
    fn unverified_domain_is_warning() {
        let feedback = feedback_for_summary(&summary(
            1,
            vec![(
                "mia@example.com",
                Err("http 403: The example.org domain is not verified"),
            )],
        ));
        assert_eq!(feedback.kind, FeedbackKind::Warning);
        assert!(feedback.message.contains("Verify the sending domain"));
    }

    #[test]
    fn unreachable_endpoint_is_distinct_error() {
        let feedback = feedback_for_outcome(&TriggerOutcome::Unreachable(
            "connection refused".to_string(),
        ));
        assert_eq!(feedback.kind, FeedbackKind::Error);
        assert_eq!(feedback.title, "Reminder service unreachable");
        assert!(feedback.message.contains("hosting platform may be inactive"));

        let rejected = feedback_for_outcome(&TriggerOutcome::Rejected(
            "missing configuration: RESEND_API_KEY is not set".to_string(),
        ));
        assert_eq!(rejected.kind, FeedbackKind::Error);
        assert_ne!(rejected.title, feedback.title);
    }

    #[test]
    fn body_level_error_with_ok_status_is_rejected() {
        let outcome = classify_response(StatusCode::OK, r#"{"error":"Student not found"}"#);
        assert_eq!(outcome, TriggerOutcome::Rejected("Student not found".to_string()));
    }

    #[test]
    fn completed_summary_is_parsed() {
        let body = serde_json::to_string(&summary(1, vec![("mia@example.com", Ok("m1"))])).unwrap();
        match classify_response(StatusCode::OK, &body) {
            TriggerOutcome::Completed(parsed) => assert_eq!(parsed.emails_sent, 1),
            other => panic!("expected completed outcome, got {other:?}"),
        }
    }

    #[test]
    fn gateway_errors_without_body_are_unreachable() {
        let outcome = classify_response(StatusCode::SERVICE_UNAVAILABLE, "<html>asleep</html>");
        assert!(matches!(outcome, TriggerOutcome::Unreachable(_)));

        let outcome = classify_response(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(outcome, TriggerOutcome::Rejected(_)));
    }

    #[test]
    fn validation_runs_before_any_request() {
        assert_eq!(validate(None, 3), Err(TriggerError::MissingRecipient));
        assert_eq!(validate(Some("  "), 3), Err(TriggerError::MissingRecipient));
        assert_eq!(validate(Some("mia@example.com"), 0), Err(TriggerError::NoPendingTasks));
        assert_eq!(validate(Some("mia@example.com"), 1), Ok(()));
    }

    #[tokio::test]
    async fn invalid_input_reports_without_loading() {
        let client = ReminderTriggerClient::new("http://127.0.0.1:9/unused", None).unwrap();
        let reporter = RecordingReporter::default();
        let request = ManualReminderRequest {
            student_id: Uuid::nil(),
            custom_email: None,
            debug: true,
            domain: None,
            mode: None,
        };

        let feedback = client.send_test_reminder(&request, None, 2, &reporter).await;

        assert_eq!(feedback.kind, FeedbackKind::Error);
        assert_eq!(*reporter.events.lock().unwrap(), vec!["error".to_string()]);
    }

    #[tokio::test]
    async fn blank_custom_email_is_checked_instead_of_profile_address() {
        let client = ReminderTriggerClient::new("http://127.0.0.1:9/unused", None).unwrap();
        let reporter = RecordingReporter::default();
        let request = ManualReminderRequest {
            student_id: Uuid::nil(),
            custom_email: Some("  ".to_string()),
            debug: false,
            domain: None,
            mode: None,
        };

        let feedback = client
            .send_test_reminder(&request, Some("mia@example.com"), 2, &reporter)
            .await;

        assert_eq!(feedback.title, "Missing recipient");
        assert_eq!(*reporter.events.lock().unwrap(), vec!["error".to_string()]);
    }

    #[test]
    fn summary_without_details_does_not_guess_the_cause() {
        let mut partial = summary(
            1,
            vec![("mia@example.com", Ok("m1")), ("mom@example.com", Err("x"))],
        );
        partial.details = None;
        let feedback = feedback_for_summary(&partial);
        assert_eq!(feedback.kind, FeedbackKind::Warning);
        assert!(feedback.message.contains("Sent 1, failed 1"));

        let mut failed = summary(1, vec![("mia@example.com", Err("x"))]);
        failed.details = None;
        let feedback = feedback_for_summary(&failed);
        assert_eq!(feedback.kind, FeedbackKind::Error);
        assert!(feedback.message.contains("sending domain"));
    }

    #[test]
    fn manual_request_uses_camel_case_and_rejects_unknown_fields() {
        let request: ManualReminderRequest = serde_json::from_str(
            r#"{"studentId":"00000000-0000-0000-0000-000000000000","customEmail":"a@x.com","debug":true}"#,
        )
        .unwrap();
        assert_eq!(request.custom_email.as_deref(), Some("a@x.com"));
        assert!(request.debug);

        let err = serde_json::from_str::<ManualReminderRequest>(
            r#"{"studentId":"00000000-0000-0000-0000-000000000000","student":"x"}"#,
        );
        assert!(err.is_err());
    }
}
