use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{PlanId, UserId};

//
// ─── TASKS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Video,
    Reading,
    Practice,
    Revision,
    Quiz,
}

/// One unit of work inside a study day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub title: String,
    /// Minutes, for timed tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Problem count, for practice tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    #[must_use]
    pub fn timed(kind: TaskKind, title: impl Into<String>, minutes: u32) -> Self {
        Self {
            kind,
            title: title.into(),
            duration: Some(minutes),
            count: None,
            completed: false,
        }
    }

    #[must_use]
    pub fn practice(title: impl Into<String>, count: u32) -> Self {
        Self {
            kind: TaskKind::Practice,
            title: title.into(),
            duration: None,
            count: Some(count),
            completed: false,
        }
    }
}

//
// ─── STUDY DAY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl DayStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Pending => "pending",
            DayStatus::InProgress => "in_progress",
            DayStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DayStatus::Pending),
            "in_progress" => Some(DayStatus::InProgress),
            "completed" => Some(DayStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlanError {
    #[error("no valid subtopics found for the selected topics")]
    NoSubtopics,

    #[error("task index {index} out of range (day has {len} tasks)")]
    TaskOutOfRange { index: usize, len: usize },
}

/// One row of a learner's plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyDay {
    pub id: PlanId,
    pub user_id: UserId,
    pub day_number: u32,
    pub plan_date: NaiveDate,
    pub topic: String,
    pub subtopics: Vec<String>,
    pub tasks: Vec<Task>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub status: DayStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StudyDay {
    /// Mark one task done and move the day along its status lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::TaskOutOfRange` if `index` does not name a task.
    pub fn complete_task(&mut self, index: usize, now: DateTime<Utc>) -> Result<(), PlanError> {
        let len = self.tasks.len();
        let task = self
            .tasks
            .get_mut(index)
            .ok_or(PlanError::TaskOutOfRange { index, len })?;
        task.completed = true;

        if self.all_tasks_done() {
            self.status = DayStatus::Completed;
            self.completed_at = Some(now);
        } else if self.status == DayStatus::Pending {
            self.status = DayStatus::InProgress;
        }
        Ok(())
    }

    #[must_use]
    pub fn all_tasks_done(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }

    #[must_use]
    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = DayStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn reset(&mut self) {
        self.status = DayStatus::Pending;
        self.completed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn day_with(tasks: Vec<Task>) -> StudyDay {
        let now = fixed_now();
        StudyDay {
            id: PlanId::generate(),
            user_id: UserId::generate(),
            day_number: 1,
            plan_date: now.date_naive(),
            topic: "DBMS".into(),
            subtopics: vec!["ER Model".into()],
            tasks,
            estimated_hours: 4.0,
            actual_hours: 0.0,
            status: DayStatus::Pending,
            completed_at: None,
        }
    }

    #[test]
    fn completing_tasks_walks_status() {
        let now = fixed_now();
        let mut day = day_with(vec![
            Task::timed(TaskKind::Video, "Intro", 30),
            Task::practice("Problems", 3),
        ]);

        day.complete_task(0, now).unwrap();
        assert_eq!(day.status, DayStatus::InProgress);
        assert!(day.completed_at.is_none());

        day.complete_task(1, now).unwrap();
        assert_eq!(day.status, DayStatus::Completed);
        assert_eq!(day.completed_at, Some(now));
    }

    #[test]
    fn out_of_range_task_is_rejected() {
        let mut day = day_with(vec![Task::practice("Problems", 3)]);
        let err = day.complete_task(4, fixed_now()).unwrap_err();
        assert_eq!(err, PlanError::TaskOutOfRange { index: 4, len: 1 });
        assert!(!day.tasks[0].completed);
    }

    #[test]
    fn task_json_uses_type_field() {
        let json = serde_json::to_value(Task::practice("Easy Problems", 3)).unwrap();
        assert_eq!(json["type"], "practice");
        assert_eq!(json["count"], 3);
        assert!(json.get("duration").is_none());

        let back: Task = serde_json::from_value(json).unwrap();
        assert!(!back.completed);
    }
}
