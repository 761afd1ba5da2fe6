//! Reminder function endpoints: the batch job and the manual single-student trigger.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::post,
};
use chrono::Utc;
use serde::{Deserialize, de::DeserializeOwned};
use services::services::{
    reminder_job::{ReminderRunRequest, ReminderRunSummary},
    reminder_trigger::{ManualReminderRequest, TriggerFailure},
    reminder_window::ReminderMode,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, error::FunctionError};

/// Body of the batch endpoints. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunRemindersBody {
    #[serde(default)]
    pub mode: Option<ReminderMode>,
    #[serde(default)]
    pub test_student_id: Option<Uuid>,
    #[serde(default)]
    pub debug: bool,
}

impl RunRemindersBody {
    fn into_request(self) -> ReminderRunRequest {
        ReminderRunRequest {
            mode: self.mode.unwrap_or_default(),
            student_id: self.test_student_id,
            debug: self.debug,
            ..Default::default()
        }
    }
}

/// An empty (or whitespace-only) body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, FunctionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| FunctionError::InvalidRequest(e.to_string()))
}

/// POST /functions/v1/auto-todo-reminders
pub async fn auto_todo_reminders(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ResponseJson<ReminderRunSummary>, FunctionError> {
    let request = parse_body::<RunRemindersBody>(&body)?.into_request();
    run_batch(&state, request).await
}

/// POST /functions/v1/weekly-todo-reminders
/// Same job, always over the weekly window.
pub async fn weekly_todo_reminders(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ResponseJson<ReminderRunSummary>, FunctionError> {
    let mut request = parse_body::<RunRemindersBody>(&body)?.into_request();
    request.mode = ReminderMode::Weekly;
    run_batch(&state, request).await
}

async fn run_batch(
    state: &AppState,
    request: ReminderRunRequest,
) -> Result<ResponseJson<ReminderRunSummary>, FunctionError> {
    let job = state.reminder_job()?;
    info!(mode = %request.mode, student_id = ?request.student_id, "Reminder run requested");

    let summary = job.run(&request, Utc::now()).await?;
    Ok(ResponseJson(summary))
}

/// POST /functions/v1/send-todo-reminder
/// Always answers 200; failures are reported in the body as `{error, message}`.
pub async fn send_todo_reminder(State(state): State<AppState>, body: Bytes) -> Response {
    match send_one(&state, &body).await {
        Ok(summary) => ResponseJson(summary).into_response(),
        Err(e) => {
            warn!(code = e.code(), "Manual reminder failed: {}", e);
            ResponseJson(TriggerFailure {
                error: e.code().to_string(),
                message: Some(e.to_string()),
            })
            .into_response()
        }
    }
}

async fn send_one(state: &AppState, body: &Bytes) -> Result<ReminderRunSummary, FunctionError> {
    let manual: ManualReminderRequest =
        serde_json::from_slice(body).map_err(|e| FunctionError::InvalidRequest(e.to_string()))?;
    if manual
        .custom_email
        .as_deref()
        .is_some_and(|email| email.trim().is_empty())
    {
        return Err(FunctionError::InvalidRequest(
            "customEmail must not be blank".to_string(),
        ));
    }
    let job = state.reminder_job()?;

    if !job.student_exists(manual.student_id).await? {
        return Err(FunctionError::StudentNotFound(manual.student_id));
    }

    let request = ReminderRunRequest {
        mode: manual.mode.unwrap_or_default(),
        student_id: Some(manual.student_id),
        debug: manual.debug,
        recipient_override: manual.custom_email,
        from_domain: manual.domain,
    };
    Ok(job.run(&request, Utc::now()).await?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auto-todo-reminders", post(auto_todo_reminders))
        .route("/weekly-todo-reminders", post(weekly_todo_reminders))
        .route("/send-todo-reminder", post(send_todo_reminder))
}
