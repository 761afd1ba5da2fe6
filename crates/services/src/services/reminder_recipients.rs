//! Resolves which addresses receive each student's reminder.

use std::collections::{HashMap, HashSet};

use db::models::profile::Profile;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::warn;
use uuid::Uuid;

use super::reminder_store::ReminderStore;

/// How duplicate addresses are detected when merging a student's recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecipientDedup {
    /// Exact string match; `Mia@x.com` and `mia@x.com` are both sent to.
    #[default]
    Exact,
    /// Trimmed, ASCII-lowercased comparison.
    Normalized,
}

impl RecipientDedup {
    fn key(self, email: &str) -> String {
        match self {
            RecipientDedup::Exact => email.to_string(),
            RecipientDedup::Normalized => email.trim().to_ascii_lowercase(),
        }
    }
}

/// Profile email first, then auxiliary addresses, keeping the first
/// occurrence of each duplicate. Blank entries are dropped.
pub fn merge_recipients<'a, I>(
    profile_email: Option<&'a str>,
    extra: I,
    policy: RecipientDedup,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for email in profile_email.into_iter().chain(extra) {
        if email.trim().is_empty() {
            continue;
        }
        if seen.insert(policy.key(email)) {
            merged.push(email.to_string());
        }
    }

    merged
}

/// Recipients for every student in `profiles`, keyed by student id.
///
/// Auxiliary addresses are fetched in one query. If that query fails the run
/// carries on with profile emails only.
pub async fn resolve_recipients(
    store: &dyn ReminderStore,
    profiles: &HashMap<Uuid, Profile>,
    policy: RecipientDedup,
) -> HashMap<Uuid, Vec<String>> {
    let student_ids: Vec<Uuid> = profiles.keys().copied().collect();

    let mut extra_by_student: HashMap<Uuid, Vec<String>> = HashMap::new();
    match store.reminder_recipients_for(&student_ids).await {
        Ok(recipients) => {
            for recipient in recipients {
                extra_by_student
                    .entry(recipient.student_id)
                    .or_default()
                    .push(recipient.email);
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                students = student_ids.len(),
                "Failed to fetch auxiliary reminder addresses, using profile emails only"
            );
        }
    }

    profiles
        .iter()
        .map(|(student_id, profile)| {
            let extra = extra_by_student
                .get(student_id)
                .map(|emails| emails.iter().map(String::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            let merged = merge_recipients(profile.contact_email(), extra, policy);
            (*student_id, merged)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::reminder_recipient::ReminderRecipient;

    use super::*;
    use crate::testing::InMemoryReminderStore;

    fn profile(id: Uuid, email: Option<&str>) -> Profile {
        Profile {
            id,
            full_name: Some("Mia".to_string()),
            email: email.map(str::to_string),
        }
    }

    fn aux(student_id: Uuid, email: &str) -> ReminderRecipient {
        ReminderRecipient {
            id: Uuid::new_v4(),
            student_id,
            email: email.to_string(),
            display_name: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn profile_email_is_not_sent_twice() {
        let merged = merge_recipients(
            Some("a@x.com"),
            ["a@x.com", "b@x.com"],
            RecipientDedup::Exact,
        );
        assert_eq!(merged, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn exact_policy_keeps_case_variants() {
        let merged = merge_recipients(Some("a@x.com"), ["A@x.com"], RecipientDedup::Exact);
        assert_eq!(merged, vec!["a@x.com", "A@x.com"]);
    }

    #[test]
    fn normalized_policy_folds_case_and_whitespace() {
        let merged = merge_recipients(
            Some("a@x.com"),
            ["A@X.com ", "b@x.com"],
            RecipientDedup::Normalized,
        );
        assert_eq!(merged, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn no_addresses_yields_empty_list() {
        let merged = merge_recipients(None, std::iter::empty(), RecipientDedup::Exact);
        assert!(merged.is_empty());

        let merged = merge_recipients(Some(""), [" "], RecipientDedup::Exact);
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn resolves_profile_and_auxiliary_addresses() {
        let mia = Uuid::new_v4();
        let noah = Uuid::new_v4();
        let store = InMemoryReminderStore::default()
            .with_recipient(aux(mia, "a@x.com"))
            .with_recipient(aux(mia, "parent@x.com"))
            .with_recipient(aux(noah, "guardian@x.com"));
        let profiles = HashMap::from([
            (mia, profile(mia, Some("a@x.com"))),
            (noah, profile(noah, None)),
        ]);

        let resolved = resolve_recipients(&store, &profiles, RecipientDedup::Exact).await;

        assert_eq!(resolved[&mia], vec!["a@x.com", "parent@x.com"]);
        assert_eq!(resolved[&noah], vec!["guardian@x.com"]);
    }

    #[tokio::test]
    async fn auxiliary_fetch_failure_falls_back_to_profile_email() {
        let mia = Uuid::new_v4();
        let store = InMemoryReminderStore::default()
            .with_recipient(aux(mia, "parent@x.com"))
            .failing_recipient_lookup();
        let profiles = HashMap::from([(mia, profile(mia, Some("mia@example.com")))]);

        let resolved = resolve_recipients(&store, &profiles, RecipientDedup::Exact).await;

        assert_eq!(resolved[&mia], vec!["mia@example.com"]);
    }
}
