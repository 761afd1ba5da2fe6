use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::todo::{CreateTodo, Todo, UpdateTodo};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct TodoListQuery {
    #[serde(default)]
    pub pending: bool,
}

/// GET /api/students/{student_id}/todos
pub async fn list_todos(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<TodoListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Todo>>>, ApiError> {
    let todos = Todo::find_by_student_id(&state.db()?.pool, student_id, query.pending).await?;
    Ok(ResponseJson(ApiResponse::success(todos)))
}

/// POST /api/students/{student_id}/todos
pub async fn create_todo(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateTodo>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Todo>>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let todo = Todo::create(&state.db()?.pool, student_id, &payload).await?;
    tracing::info!(todo_id = %todo.id, %student_id, "Created todo");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(todo))))
}

/// PATCH /api/todos/{id}
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTodo>,
) -> Result<ResponseJson<ApiResponse<Todo>>, ApiError> {
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let todo = Todo::update(&state.db()?.pool, id, &payload)
        .await?
        .ok_or(ApiError::NotFound("todo"))?;
    Ok(ResponseJson(ApiResponse::success(todo)))
}

/// DELETE /api/todos/{id}
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match Todo::delete(&state.db()?.pool, id).await? {
        0 => Err(ApiError::NotFound("todo")),
        _ => Ok(ResponseJson(ApiResponse::success(()))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/students/{student_id}/todos",
            get(list_todos).post(create_todo),
        )
        .route("/todos/{id}", patch(update_todo).delete(delete_todo))
}
