//! Renders the reminder email for one student.
//!
//! Rendering is pure: the caller supplies `now`, so the same inputs always
//! produce byte-identical HTML and text bodies.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use db::models::todo::Todo;
use minijinja::{Environment, context};
use serde::Serialize;
use thiserror::Error;

use super::reminder_window::ReminderMode;

const HTML_TEMPLATE: &str = include_str!("../../templates/reminder.html");
const TEXT_TEMPLATE: &str = include_str!("../../templates/reminder.txt");

const HTML_NAME: &str = "reminder.html";
const TEXT_NAME: &str = "reminder.txt";

const SECONDS_PER_DAY: i64 = 86_400;

const URGENT_HEADER_COLOR: &str = "#b91c1c";
const NEUTRAL_HEADER_COLOR: &str = "#1e3a8a";

#[derive(Debug, Error)]
#[error("template error: {0}")]
pub struct TemplateError(#[from] minijinja::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Overdue,
    DueTomorrow,
    DueSoon,
    DueThisWeek,
    Upcoming,
}

impl Urgency {
    pub fn from_days_left(days_left: i64) -> Self {
        match days_left {
            d if d <= 0 => Urgency::Overdue,
            1 => Urgency::DueTomorrow,
            2..=3 => Urgency::DueSoon,
            4..=7 => Urgency::DueThisWeek,
            _ => Urgency::Upcoming,
        }
    }

    /// Tag shown next to the task, `None` for a plain date.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Urgency::Overdue => Some("overdue"),
            Urgency::DueTomorrow => Some("due tomorrow"),
            Urgency::DueSoon => Some("due soon"),
            Urgency::DueThisWeek => Some("due this week"),
            Urgency::Upcoming => None,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Urgency::Overdue => "#991b1b",
            Urgency::DueTomorrow => "#dc2626",
            Urgency::DueSoon => "#ea580c",
            Urgency::DueThisWeek => "#2563eb",
            Urgency::Upcoming => "#6b7280",
        }
    }
}

/// Whole days until the start of `due_date` (UTC), rounded up.
pub fn days_left(due_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    let due = due_date.and_time(NaiveTime::MIN).and_utc();
    let seconds = (due - now).num_seconds();
    (seconds + SECONDS_PER_DAY - 1).div_euclid(SECONDS_PER_DAY)
}

/// Mode-specific subject; always names the student and the pending count.
pub fn subject_line(mode: ReminderMode, student_name: &str, task_count: usize) -> String {
    let tasks = if task_count == 1 { "task" } else { "tasks" };
    match mode {
        ReminderMode::Urgent => format!(
            "Urgent: {student_name}, you have {task_count} {tasks} due in the next {} days",
            mode.horizon_days()
        ),
        ReminderMode::Weekly => {
            format!("Weekly reminder for {student_name}: {task_count} pending {tasks} this week")
        }
        ReminderMode::Monthly => format!(
            "Monthly overview for {student_name}: {task_count} pending {tasks} in the next {} days",
            mode.horizon_days()
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReminder {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct TaskRow<'a> {
    title: &'a str,
    due_display: String,
    tag: Option<&'static str>,
    tag_color: &'static str,
}

impl<'a> TaskRow<'a> {
    fn new(todo: &'a Todo, now: DateTime<Utc>) -> Self {
        match todo.due_date {
            Some(due) => {
                let urgency = Urgency::from_days_left(days_left(due, now));
                TaskRow {
                    title: &todo.title,
                    due_display: format!("Due {}", due.format("%A, %B %-d, %Y")),
                    tag: urgency.label(),
                    tag_color: urgency.color(),
                }
            }
            None => TaskRow {
                title: &todo.title,
                due_display: "No due date".to_string(),
                tag: None,
                tag_color: Urgency::Upcoming.color(),
            },
        }
    }
}

/// Holds the compiled reminder templates. Build once and share.
pub struct ReminderRenderer {
    env: Environment<'static>,
}

impl ReminderRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        // `.html` names get HTML auto-escaping, `.txt` names are left as-is.
        env.add_template(HTML_NAME, HTML_TEMPLATE)?;
        env.add_template(TEXT_NAME, TEXT_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render(
        &self,
        student_name: &str,
        todos: &[Todo],
        mode: ReminderMode,
        now: DateTime<Utc>,
    ) -> Result<RenderedReminder, TemplateError> {
        let mut sorted: Vec<&Todo> = todos.iter().collect();
        // Stable sort; undated todos go last.
        sorted.sort_by_key(|todo| (todo.due_date.is_none(), todo.due_date));

        let rows: Vec<TaskRow<'_>> = sorted.iter().map(|todo| TaskRow::new(todo, now)).collect();
        let subject = subject_line(mode, student_name, todos.len());
        let urgent = mode == ReminderMode::Urgent;

        let ctx = context! {
            subject => &subject,
            student_name => student_name,
            heading => heading(mode),
            intro => intro(mode, todos.len()),
            urgent => urgent,
            header_color => if urgent { URGENT_HEADER_COLOR } else { NEUTRAL_HEADER_COLOR },
            horizon_days => mode.horizon_days(),
            rows => rows,
        };

        let html = self.env.get_template(HTML_NAME)?.render(&ctx)?;
        let text = self.env.get_template(TEXT_NAME)?.render(&ctx)?;

        Ok(RenderedReminder {
            subject,
            html,
            text,
        })
    }
}

fn heading(mode: ReminderMode) -> &'static str {
    match mode {
        ReminderMode::Urgent => "Urgent task reminder",
        ReminderMode::Weekly => "Your weekly task reminder",
        ReminderMode::Monthly => "Your monthly task overview",
    }
}

fn intro(mode: ReminderMode, task_count: usize) -> String {
    let tasks = if task_count == 1 { "task" } else { "tasks" };
    match mode {
        ReminderMode::Urgent => format!(
            "You have {task_count} pending {tasks} due in the next {} days. Please take care of them as soon as possible.",
            mode.horizon_days()
        ),
        ReminderMode::Weekly | ReminderMode::Monthly => format!(
            "You have {task_count} pending {tasks} due in the next {} days.",
            mode.horizon_days()
        ),
    }
}
