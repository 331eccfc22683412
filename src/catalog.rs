use std::collections::BTreeMap;

pub const TELEGRAM_SUBSCRIBE: &str = "telegram_subscribe";
pub const TWITTER_FOLLOW: &str = "twitter_follow";
pub const REFERRAL_CODE: &str = "referral_code";
pub const EMAIL_VERIFY: &str = "email_verify";
pub const PROFILE_COMPLETE: &str = "profile_complete";

/// Read-only table of task types and the points each one is worth.
///
/// The catalog also names the one task type whose completion pays the
/// completing user's referrer a bonus.
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    entries: BTreeMap<String, i64>,
    referral_task: String,
}

impl TaskCatalog {
    /// Builds a catalog from explicit entries. Entries worth zero or less are dropped,
    /// so every type the catalog knows resolves to a positive value.
    pub fn new<I, S>(entries: I, referral_task: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, points)| (name.into(), points))
            .filter(|(_, points)| *points > 0)
            .collect();

        TaskCatalog {
            entries,
            referral_task: referral_task.into(),
        }
    }

    pub fn points_for(&self, task_type: &str) -> Option<i64> {
        self.entries.get(task_type).copied()
    }

    pub fn is_referral_task(&self, task_type: &str) -> bool {
        self.referral_task == task_type
    }

    /// Floor of half the awarded points.
    pub fn referral_bonus(&self, points: i64) -> i64 {
        points.div_euclid(2)
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for TaskCatalog {
    fn default() -> Self {
        TaskCatalog::new(
            [
                (TELEGRAM_SUBSCRIBE, 50),
                (TWITTER_FOLLOW, 50),
                (REFERRAL_CODE, 100),
                (EMAIL_VERIFY, 25),
                (PROFILE_COMPLETE, 30),
            ],
            REFERRAL_CODE,
        )
    }
}
