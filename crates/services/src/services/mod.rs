pub mod config;
pub mod email_provider;
pub mod reminder_job;
pub mod reminder_recipients;
pub mod reminder_scheduler;
pub mod reminder_store;
pub mod reminder_template;
pub mod reminder_trigger;
pub mod reminder_window;
