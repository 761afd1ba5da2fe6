//! Optional in-process schedule for reminder runs.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::{
    reminder_job::{ReminderJob, ReminderRunRequest},
    reminder_trigger::{FeedbackReporter, TracingReporter, feedback_for_summary},
    reminder_window::ReminderMode,
};

/// Background service that runs the reminder job on a fixed interval.
pub struct ReminderScheduler {
    job: Arc<ReminderJob>,
    mode: ReminderMode,
    poll_interval: Duration,
    reporter: Arc<dyn FeedbackReporter>,
}

impl ReminderScheduler {
    /// Spawn the background reminder scheduler
    pub fn spawn(
        job: Arc<ReminderJob>,
        mode: ReminderMode,
        poll_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Self {
            job,
            mode,
            poll_interval,
            reporter: Arc::new(TracingReporter),
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting reminder scheduler with interval {:?}, mode: {}",
            self.poll_interval, self.mode
        );

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; reminders go out one interval after start.
        interval.tick().await;

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    async fn run_once(&self) {
        let request = ReminderRunRequest {
            mode: self.mode,
            ..Default::default()
        };

        match self.job.run(&request, Utc::now()).await {
            Ok(summary) => self.reporter.report(&feedback_for_summary(&summary)),
            Err(e) => error!(mode = %self.mode, "Scheduled reminder run failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;
    use db::models::{profile::Profile, todo::Todo};
    use uuid::Uuid;

    use super::*;
    use crate::{
        services::{
            reminder_job::SenderIdentity,
            reminder_trigger::{Feedback, FeedbackKind},
        },
        testing::{InMemoryReminderStore, RecordingEmailSender},
    };

    #[derive(Default)]
    struct CollectingReporter {
        kinds: std::sync::Mutex<Vec<FeedbackKind>>,
    }

    impl FeedbackReporter for CollectingReporter {
        fn report(&self, feedback: &Feedback) {
            self.kinds.lock().unwrap().push(feedback.kind);
        }
    }

    #[tokio::test]
    async fn scheduled_run_reports_summary() {
        let mia = Uuid::new_v4();
        let now = Utc::now();
        let store = InMemoryReminderStore::default()
            .with_profile(Profile {
                id: mia,
                full_name: Some("Mia".to_string()),
                email: Some("mia@example.com".to_string()),
            })
            .with_todo(Todo {
                id: Uuid::new_v4(),
                student_id: mia,
                title: "Essay".to_string(),
                due_date: now.date_naive().checked_add_days(Days::new(2)),
                completed: false,
                created_at: now,
                updated_at: now,
            });
        let mailer = Arc::new(RecordingEmailSender::default());
        let job = ReminderJob::new(
            Arc::new(store),
            mailer.clone(),
            SenderIdentity::new("Counseling Reminders", "mail.example.org"),
        )
        .unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let scheduler = ReminderScheduler {
            job: Arc::new(job),
            mode: ReminderMode::Urgent,
            poll_interval: Duration::from_secs(3600),
            reporter: reporter.clone(),
        };

        scheduler.run_once().await;

        assert_eq!(*reporter.kinds.lock().unwrap(), vec![FeedbackKind::Success]);
        assert_eq!(mailer.sent().await.len(), 1);
    }
}
