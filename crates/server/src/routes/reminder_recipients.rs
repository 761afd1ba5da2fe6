//! Extra addresses copied on a student's reminders.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::reminder_recipient::{CreateReminderRecipient, ReminderRecipient};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// GET /api/students/{student_id}/reminder-recipients
pub async fn list_recipients(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<ReminderRecipient>>>, ApiError> {
    let recipients = ReminderRecipient::find_by_student_id(&state.db()?.pool, student_id).await?;
    Ok(ResponseJson(ApiResponse::success(recipients)))
}

/// POST /api/students/{student_id}/reminder-recipients
/// 409 when the address is already registered for this student.
pub async fn add_recipient(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateReminderRecipient>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ReminderRecipient>>), ApiError> {
    let recipient = ReminderRecipient::create(&state.db()?.pool, student_id, &payload).await?;
    tracing::info!(recipient_id = %recipient.id, %student_id, "Added reminder recipient");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(recipient))))
}

/// DELETE /api/reminder-recipients/{id}
pub async fn remove_recipient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match ReminderRecipient::delete(&state.db()?.pool, id).await? {
        0 => Err(ApiError::NotFound("reminder recipient")),
        _ => Ok(ResponseJson(ApiResponse::success(()))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/students/{student_id}/reminder-recipients",
            get(list_recipients).post(add_recipient),
        )
        .route("/reminder-recipients/{id}", delete(remove_recipient))
}
