//! Reminder modes and the due-date window each one covers.

use chrono::{DateTime, Days, NaiveDate, Utc};
use db::models::todo::Todo;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReminderMode {
    /// Everything due in the next 40 days.
    Monthly,
    /// Everything due in the next 7 days.
    #[default]
    Weekly,
    /// Everything due in the next 3 days, with an action banner.
    Urgent,
}

impl ReminderMode {
    pub fn horizon_days(self) -> u64 {
        match self {
            ReminderMode::Monthly => 40,
            ReminderMode::Weekly => 7,
            ReminderMode::Urgent => 3,
        }
    }
}

/// Inclusive range of due dates selected by a reminder run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct DueWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DueWindow {
    pub fn for_mode(mode: ReminderMode, now: DateTime<Utc>) -> Self {
        let start = now.date_naive();
        let end = start
            .checked_add_days(Days::new(mode.horizon_days()))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// A todo is selected when it is pending and has a due date inside the window.
    /// `Todo::find_pending_due_between` expresses the same predicate in SQL.
    pub fn admits(&self, todo: &Todo) -> bool {
        todo.is_pending() && todo.due_date.is_some_and(|due| self.contains(due))
    }
}
