use chrono::NaiveDate;
use serde::Serialize;

use crate::model::UserId;

/// One row per learner per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAnalytics {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub topics_covered: Vec<String>,
    pub quizzes_attempted: u32,
    pub avg_quiz_score: f64,
    pub hours_studied: f64,
    pub tasks_completed: u32,
    pub streak_maintained: bool,
}

impl DailyAnalytics {
    #[must_use]
    pub fn empty(user_id: UserId, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            topics_covered: Vec::new(),
            quizzes_attempted: 0,
            avg_quiz_score: 0.0,
            hours_studied: 0.0,
            tasks_completed: 0,
            streak_maintained: false,
        }
    }
}
