//! Day progression: rollover, completion, streaks and summaries.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{DailyAnalytics, DayStatus, Quiz, QuizStatus, StudentProfile, StudyDay};

pub const WEEK_WARRIOR_STREAK: u32 = 7;
pub const CONSISTENCY_STREAK: u32 = 3;
pub const QUIZ_MASTER_COUNT: usize = 10;
pub const QUIZ_ENTHUSIAST_COUNT: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("Please complete all tasks ({done}/{total} done)")]
    TasksIncomplete { done: usize, total: usize },
}

//
// ─── ROLLOVER ──────────────────────────────────────────────────────────────────
//

/// Result of checking whether a new calendar day has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rollover {
    pub changed: bool,
    pub day_number: u32,
    /// Day number the learner was on before the rollover.
    pub previous_day: u32,
    /// Date to record analytics for, when the previous day should be logged.
    pub last_active: Option<NaiveDate>,
    pub days_passed: u32,
    pub message: String,
}

/// Advance the profile to `today` if it was last active on an earlier date.
///
/// `previous_plan` is the plan row for the day the learner was on; it is
/// auto-completed when every task is done.
pub fn rollover(
    profile: &mut StudentProfile,
    today: NaiveDate,
    previous_plan: Option<&mut StudyDay>,
    now: DateTime<Utc>,
) -> Rollover {
    let previous_day = profile.current_day;
    let Some(last_active) = profile.last_active_date else {
        profile.last_active_date = Some(today);
        profile.updated_at = now;
        return Rollover {
            changed: false,
            day_number: profile.current_day,
            previous_day,
            last_active: None,
            days_passed: 0,
            message: "Welcome!".to_string(),
        };
    };

    if last_active >= today {
        return Rollover {
            changed: false,
            day_number: profile.current_day,
            previous_day,
            last_active: Some(last_active),
            days_passed: 0,
            message: String::new(),
        };
    }

    let days_passed = u32::try_from((today - last_active).num_days()).unwrap_or(u32::MAX);
    profile.current_day = profile.current_day.saturating_add(days_passed);
    profile.last_active_date = Some(today);
    profile.streak = if days_passed == 1 {
        profile.streak.saturating_add(1)
    } else {
        1
    };
    if let Some(remaining) = profile.days_remaining {
        profile.days_remaining = Some(remaining.saturating_sub(days_passed));
    }
    profile.updated_at = now;

    if let Some(plan) = previous_plan {
        if !plan.tasks.is_empty() && plan.all_tasks_done() && plan.status != DayStatus::Completed {
            plan.mark_completed(now);
        }
    }

    let mut message = format!("Welcome to Day {}!", profile.current_day);
    if days_passed > 1 {
        message.push_str(&format!(
            " (You were away for {days_passed} days. Streak reset to 1.)"
        ));
    }

    Rollover {
        changed: true,
        day_number: profile.current_day,
        previous_day,
        last_active: Some(last_active),
        days_passed,
        message,
    }
}

/// Analytics row for a finished plan day.
#[must_use]
pub fn day_analytics(
    profile: &StudentProfile,
    date: NaiveDate,
    plan: &StudyDay,
    day_quizzes: &[Quiz],
) -> DailyAnalytics {
    let completed: Vec<&Quiz> = day_quizzes
        .iter()
        .filter(|q| q.status == QuizStatus::Completed)
        .collect();
    let avg_quiz_score = if completed.is_empty() {
        0.0
    } else {
        let total: f64 = completed
            .iter()
            .map(|q| raw_percentage(q.score.unwrap_or(0), q.max_score))
            .sum();
        total / completed.len() as f64
    };

    let done = plan.completed_task_count();
    let topics_covered = if !plan.tasks.is_empty() && done == plan.tasks.len() {
        vec![plan.topic.clone()]
    } else {
        Vec::new()
    };

    DailyAnalytics {
        user_id: profile.user_id,
        date,
        topics_covered,
        quizzes_attempted: u32::try_from(completed.len()).unwrap_or(u32::MAX),
        avg_quiz_score,
        hours_studied: plan.actual_hours,
        tasks_completed: u32::try_from(done).unwrap_or(u32::MAX),
        streak_maintained: true,
    }
}

fn raw_percentage(score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(max_score) * 100.0
    }
}

//
// ─── EXPLICIT TRANSITIONS ──────────────────────────────────────────────────────
//

/// Finish today's plan and move to the next day.
///
/// # Errors
///
/// Returns `ProgressError::TasksIncomplete` unless every task is done.
pub fn complete_day(
    profile: &mut StudentProfile,
    plan: &mut StudyDay,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<String, ProgressError> {
    let done = plan.completed_task_count();
    let total = plan.tasks.len();
    if done < total {
        return Err(ProgressError::TasksIncomplete { done, total });
    }
    Ok(force_advance(profile, Some(plan), today, now))
}

/// Move to the next day regardless of task state.
pub fn force_advance(
    profile: &mut StudentProfile,
    plan: Option<&mut StudyDay>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> String {
    if let Some(plan) = plan {
        plan.mark_completed(now);
    }
    let finished = profile.current_day;
    profile.current_day = profile.current_day.saturating_add(1);
    profile.last_active_date = Some(today);
    profile.streak = profile.streak.saturating_add(1);
    if let Some(remaining) = profile.days_remaining {
        profile.days_remaining = Some(remaining.saturating_sub(1));
    }
    profile.updated_at = now;
    format!(
        "Day {finished} completed! Moving to Day {}",
        profile.current_day
    )
}

pub fn reset_to_day_one(profile: &mut StudentProfile, today: NaiveDate, now: DateTime<Utc>) {
    profile.current_day = 1;
    profile.last_active_date = Some(today);
    profile.updated_at = now;
}

/// Start over: day 1, no streak, every plan row pending again.
pub fn reset_progress(profile: &mut StudentProfile, plans: &mut [StudyDay], now: DateTime<Utc>) {
    profile.current_day = 1;
    profile.streak = 0;
    profile.updated_at = now;
    for plan in plans {
        plan.reset();
    }
}

//
// ─── SUMMARIES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodaySummary {
    pub day_number: u32,
    pub topic: String,
    pub tasks_completed: usize,
    pub total_tasks: usize,
    pub progress_percentage: f64,
    pub streak: u32,
    pub days_remaining: Option<u32>,
}

#[must_use]
pub fn today_summary(profile: &StudentProfile, plan: Option<&StudyDay>) -> TodaySummary {
    let (topic, done, total) = match plan {
        Some(plan) => (
            plan.topic.clone(),
            plan.completed_task_count(),
            plan.tasks.len(),
        ),
        None => ("No plan".to_string(), 0, 0),
    };
    let progress_percentage = if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    };
    TodaySummary {
        day_number: profile.current_day,
        topic,
        tasks_completed: done,
        total_tasks: total,
        progress_percentage,
        streak: profile.streak,
        days_remaining: profile.days_remaining,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub topics_covered: usize,
    pub quizzes_attempted: u32,
    pub avg_quiz_score: f64,
    pub total_hours: f64,
    pub total_tasks: u32,
    pub days_active: usize,
}

/// First date of the seven-day window ending at `today`.
#[must_use]
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(7)
}

/// Aggregate analytics rows; `None` when there are none.
#[must_use]
pub fn week_summary(rows: &[DailyAnalytics]) -> Option<WeekSummary> {
    if rows.is_empty() {
        return None;
    }
    let avg_quiz_score = rows.iter().map(|r| r.avg_quiz_score).sum::<f64>() / rows.len() as f64;
    Some(WeekSummary {
        topics_covered: rows.iter().map(|r| r.topics_covered.len()).sum(),
        quizzes_attempted: rows.iter().map(|r| r.quizzes_attempted).sum(),
        avg_quiz_score,
        total_hours: rows.iter().map(|r| r.hours_studied).sum(),
        total_tasks: rows.iter().map(|r| r.tasks_completed).sum(),
        days_active: rows.len(),
    })
}

//
// ─── ACHIEVEMENTS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub title: &'static str,
    pub description: String,
}

/// Badges earned from the streak and completed quiz history.
#[must_use]
pub fn achievements(streak: u32, completed_quizzes: &[Quiz]) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if streak >= WEEK_WARRIOR_STREAK {
        earned.push(Achievement {
            title: "Week Warrior",
            description: format!("Maintained {streak}-day streak!"),
        });
    } else if streak >= CONSISTENCY_STREAK {
        earned.push(Achievement {
            title: "Consistency Champion",
            description: format!("{streak}-day streak!"),
        });
    }

    let completed: Vec<&Quiz> = completed_quizzes
        .iter()
        .filter(|q| q.status == QuizStatus::Completed)
        .collect();
    let count = completed.len();
    if count >= QUIZ_MASTER_COUNT {
        earned.push(Achievement {
            title: "Quiz Master",
            description: format!("Completed {count} quizzes!"),
        });
    } else if count >= QUIZ_ENTHUSIAST_COUNT {
        earned.push(Achievement {
            title: "Quiz Enthusiast",
            description: format!("Completed {count} quizzes!"),
        });
    }

    let perfect = completed.iter().filter(|q| q.is_perfect()).count();
    if perfect > 0 {
        let plural = if perfect > 1 { "s" } else { "" };
        earned.push(Achievement {
            title: "Perfect Score",
            description: format!("Achieved perfection {perfect} time{plural}!"),
        });
    }

    earned
}
