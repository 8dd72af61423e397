use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::UserId;

/// Days allotted per topic when the learner picks a deadline (lower bound).
pub const MIN_DAYS_PER_TOPIC: u32 = 7;
/// Days allotted per topic when the learner studies at their own pace.
pub const SELF_PACED_DAYS_PER_TOPIC: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

/// Per-learner study state: what they study, how fast, and where they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    pub user_id: UserId,
    pub topics: Vec<String>,
    pub levels: BTreeMap<String, Level>,
    pub hours_per_day: u32,
    pub target_date: Option<NaiveDate>,
    pub study_start_date: Option<NaiveDate>,
    pub last_active_date: Option<NaiveDate>,
    pub current_day: u32,
    pub total_planned_days: u32,
    pub days_remaining: Option<u32>,
    pub streak: u32,
    pub timezone: Option<String>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Answers collected while onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OnboardingChoices {
    pub topics: Vec<String>,
    #[serde(default)]
    pub levels: BTreeMap<String, Level>,
    pub target_date: Option<NaiveDate>,
    pub hours_per_day: u32,
}

impl StudentProfile {
    /// Fresh profile created alongside a new account.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            topics: Vec::new(),
            levels: BTreeMap::new(),
            hours_per_day: 4,
            target_date: None,
            study_start_date: None,
            last_active_date: None,
            current_day: 1,
            total_planned_days: 30,
            days_remaining: None,
            streak: 0,
            timezone: None,
            onboarding_completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn level_for(&self, topic: &str) -> Level {
        self.levels.get(topic).copied().unwrap_or_default()
    }

    /// Apply onboarding answers and restart the plan clock at day 1.
    pub fn apply_onboarding(&mut self, choices: OnboardingChoices, today: NaiveDate, now: DateTime<Utc>) {
        let (total, remaining) = planned_days(choices.topics.len(), choices.target_date, today);
        self.topics = choices.topics;
        self.levels = choices.levels;
        self.target_date = choices.target_date;
        self.hours_per_day = choices.hours_per_day;
        self.total_planned_days = total;
        self.days_remaining = remaining;
        self.onboarding_completed = true;
        self.study_start_date = Some(today);
        self.current_day = 1;
        self.updated_at = now;
    }

    /// Clear plan state so onboarding can be run again.
    pub fn clear_onboarding(&mut self, now: DateTime<Utc>) {
        self.onboarding_completed = false;
        self.current_day = 1;
        self.streak = 0;
        self.updated_at = now;
    }
}

/// Total planned days and days remaining for a set of topics.
///
/// With a target date the plan spans at least `MIN_DAYS_PER_TOPIC` per topic
/// even if the deadline is closer; without one it is self-paced.
#[must_use]
pub fn planned_days(
    topic_count: usize,
    target_date: Option<NaiveDate>,
    today: NaiveDate,
) -> (u32, Option<u32>) {
    let topics = u32::try_from(topic_count).unwrap_or(u32::MAX);
    match target_date {
        Some(target) => {
            let until = u32::try_from((target - today).num_days().max(0)).unwrap_or(u32::MAX);
            let total = until.max(topics.saturating_mul(MIN_DAYS_PER_TOPIC));
            (total, Some(until))
        }
        None => (topics.saturating_mul(SELF_PACED_DAYS_PER_TOPIC), None),
    }
}
