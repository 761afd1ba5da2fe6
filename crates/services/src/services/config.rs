//! Process configuration, read once from the environment at start-up.

use std::{str::FromStr, time::Duration};

use secrecy::SecretString;
use thiserror::Error;

use super::{reminder_recipients::RecipientDedup, reminder_window::ReminderMode};

pub const DEFAULT_FROM_DOMAIN: &str = "resend.dev";
pub const DEFAULT_FROM_NAME: &str = "Counseling Reminders";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0} is not set")]
    Missing(&'static str),
    #[error("invalid configuration for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    /// Machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Missing(_) => "configuration_error",
            ConfigError::Invalid { .. } => "invalid_configuration",
        }
    }
}

/// Recurring in-process run; absent unless both variables are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub mode: ReminderMode,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub database_url: Option<SecretString>,
    pub resend_api_key: Option<SecretString>,
    pub from_domain: String,
    pub from_name: String,
    pub recipient_dedup: RecipientDedup,
    pub max_in_flight: usize,
    pub schedule: Option<ScheduleConfig>,
    pub host: String,
    pub port: u16,
    pub run_migrations: bool,
}

impl ReminderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let recipient_dedup = match get("REMINDER_RECIPIENT_DEDUP") {
            Some(value) => parse_var("REMINDER_RECIPIENT_DEDUP", &value)?,
            None => RecipientDedup::default(),
        };

        let max_in_flight = match get("REMINDER_MAX_IN_FLIGHT") {
            Some(value) => {
                let parsed: usize = parse_var("REMINDER_MAX_IN_FLIGHT", &value)?;
                if parsed == 0 {
                    return Err(ConfigError::Invalid {
                        var: "REMINDER_MAX_IN_FLIGHT",
                        message: "must be at least 1".to_string(),
                    });
                }
                parsed
            }
            None => 1,
        };

        let schedule = match (
            get("REMINDER_SCHEDULE_MODE"),
            get("REMINDER_SCHEDULE_INTERVAL_SECS"),
        ) {
            (Some(mode), Some(secs)) => {
                let mode = parse_var("REMINDER_SCHEDULE_MODE", &mode)?;
                let secs: u64 = parse_var("REMINDER_SCHEDULE_INTERVAL_SECS", &secs)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "REMINDER_SCHEDULE_INTERVAL_SECS",
                        message: "must be greater than zero".to_string(),
                    });
                }
                Some(ScheduleConfig {
                    mode,
                    interval: Duration::from_secs(secs),
                })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("REMINDER_SCHEDULE_INTERVAL_SECS")),
            (None, Some(_)) => return Err(ConfigError::Missing("REMINDER_SCHEDULE_MODE")),
        };

        let port = match get("PORT") {
            Some(value) => parse_var("PORT", &value)?,
            None => DEFAULT_PORT,
        };

        let run_migrations = match get("RUN_MIGRATIONS") {
            Some(value) => parse_var("RUN_MIGRATIONS", &value)?,
            None => false,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").map(SecretString::from),
            resend_api_key: get("RESEND_API_KEY").map(SecretString::from),
            from_domain: get("REMINDER_FROM_DOMAIN").unwrap_or_else(|| DEFAULT_FROM_DOMAIN.to_string()),
            from_name: get("REMINDER_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            recipient_dedup,
            max_in_flight,
            schedule,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            run_migrations,
        })
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ReminderConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ReminderConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]).unwrap();

        assert!(config.database_url.is_none());
        assert!(config.resend_api_key.is_none());
        assert_eq!(config.from_domain, DEFAULT_FROM_DOMAIN);
        assert_eq!(config.from_name, DEFAULT_FROM_NAME);
        assert_eq!(config.recipient_dedup, RecipientDedup::Exact);
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.schedule, None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.run_migrations);
    }

    #[test]
    fn blank_secrets_count_as_missing() {
        let config = config(&[("RESEND_API_KEY", "  "), ("DATABASE_URL", "")]).unwrap();

        assert!(config.resend_api_key.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn reads_secrets_and_policies() {
        let config = config(&[
            ("RESEND_API_KEY", "re_123"),
            ("DATABASE_URL", "postgres://localhost/app"),
            ("REMINDER_FROM_DOMAIN", "mail.example.org"),
            ("REMINDER_RECIPIENT_DEDUP", "normalized"),
            ("REMINDER_MAX_IN_FLIGHT", "4"),
            ("REMINDER_SCHEDULE_MODE", "urgent"),
            ("REMINDER_SCHEDULE_INTERVAL_SECS", "3600"),
        ])
        .unwrap();

        assert_eq!(config.resend_api_key.unwrap().expose_secret(), "re_123");
        assert_eq!(config.from_domain, "mail.example.org");
        assert_eq!(config.recipient_dedup, RecipientDedup::Normalized);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(
            config.schedule,
            Some(ScheduleConfig {
                mode: ReminderMode::Urgent,
                interval: Duration::from_secs(3600),
            })
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            config(&[("REMINDER_MAX_IN_FLIGHT", "0")]),
            Err(ConfigError::Invalid { var: "REMINDER_MAX_IN_FLIGHT", .. })
        ));
        assert!(matches!(
            config(&[("REMINDER_RECIPIENT_DEDUP", "fuzzy")]),
            Err(ConfigError::Invalid { var: "REMINDER_RECIPIENT_DEDUP", .. })
        ));
        assert!(matches!(
            config(&[("REMINDER_SCHEDULE_MODE", "weekly")]),
            Err(ConfigError::Missing("REMINDER_SCHEDULE_INTERVAL_SECS"))
        ));
        assert!(matches!(
            config(&[("PORT", "http")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }
}
