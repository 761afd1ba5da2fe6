use anyhow::Context;
use server::{AppState, routes};
use services::services::{config::ReminderConfig, reminder_scheduler::ReminderScheduler};
use tracing::{info, warn};
use utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ReminderConfig::from_env()?;
    let state = AppState::from_config(&config)?;

    if config.run_migrations {
        match state.db() {
            Ok(db) => db.run_migrations().await.context("failed to run migrations")?,
            Err(e) => warn!("Skipping migrations: {}", e),
        }
    }

    if let Some(schedule) = &config.schedule {
        match state.reminder_job() {
            Ok(job) => {
                ReminderScheduler::spawn(job, schedule.mode, schedule.interval);
            }
            Err(e) => warn!("Reminder schedule configured but disabled: {}", e),
        }
    }

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
