use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod functions;
pub mod health;
pub mod reminder_recipients;
pub mod todos;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(todos::router())
        .merge(reminder_recipients::router());

    Router::new()
        .merge(health::router())
        .nest("/functions/v1", functions::router())
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
