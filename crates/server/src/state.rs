use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use secrecy::ExposeSecret;
use services::services::{
    config::{ConfigError, ReminderConfig},
    email_provider::ResendClient,
    reminder_job::{ReminderJob, SenderIdentity},
};
use tracing::warn;

/// Shared handles built once at start-up and handed to every request.
///
/// Missing credentials do not stop the server from starting; each request
/// that needs them reports the precondition failure instead.
#[derive(Clone)]
pub struct AppState {
    db: Option<DBService>,
    reminder_job: Result<Arc<ReminderJob>, &'static str>,
}

impl AppState {
    pub fn from_config(config: &ReminderConfig) -> anyhow::Result<Self> {
        let db = config
            .database_url
            .as_ref()
            .map(|url| DBService::connect_lazy(url.expose_secret()))
            .transpose()
            .context("invalid DATABASE_URL")?;

        let reminder_job = match (&db, &config.resend_api_key) {
            (None, _) => Err("DATABASE_URL"),
            (Some(_), None) => Err("RESEND_API_KEY"),
            (Some(db), Some(api_key)) => {
                let mailer = ResendClient::new(api_key.clone())?;
                let job = ReminderJob::new(
                    Arc::new(db.clone()),
                    Arc::new(mailer),
                    SenderIdentity::new(&config.from_name, &config.from_domain),
                )?
                .with_dedup(config.recipient_dedup)
                .with_max_in_flight(config.max_in_flight);
                Ok(Arc::new(job))
            }
        };

        if let Err(var) = &reminder_job {
            warn!("{} is not set; reminder functions will report a configuration error", var);
        }

        Ok(Self { db, reminder_job })
    }

    /// State with a ready reminder job and no database (operator routes unavailable).
    pub fn with_reminder_job(job: Arc<ReminderJob>) -> Self {
        Self {
            db: None,
            reminder_job: Ok(job),
        }
    }

    /// State with nothing configured.
    pub fn unconfigured() -> Self {
        Self {
            db: None,
            reminder_job: Err("DATABASE_URL"),
        }
    }

    pub fn db(&self) -> Result<&DBService, ConfigError> {
        self.db.as_ref().ok_or(ConfigError::Missing("DATABASE_URL"))
    }

    pub fn reminder_job(&self) -> Result<Arc<ReminderJob>, ConfigError> {
        self.reminder_job.clone().map_err(ConfigError::Missing)
    }
}
