use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use storage::repository::{PlanRepository, ProfileRepository, StorageError};
use study_core::curriculum::{PlanRequest, generate_plan};
use study_core::model::{PlanId, StudyDay, UserId};

use crate::Clock;
use crate::error::PlanServiceError;

/// What a plan (re)generation produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub days: usize,
    pub skipped_subjects: Vec<String>,
    pub compressed: bool,
}

/// Generates study plans and tracks task completion within a day.
#[derive(Clone)]
pub struct PlanService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    plans: Arc<dyn PlanRepository>,
}

impl PlanService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        plans: Arc<dyn PlanRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            plans,
        }
    }

    /// Build the whole plan from the profile and replace any existing one.
    ///
    /// The plan starts on the profile's start date (today if unset) and the
    /// learner is put back on day 1.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::NoTopics` for a profile without topics and
    /// `PlanServiceError::Plan` when none of the topics are in the curriculum.
    pub async fn generate_full_plan(&self, user_id: UserId) -> Result<PlanOutcome, PlanServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        if profile.topics.is_empty() {
            return Err(PlanServiceError::NoTopics);
        }

        let start_date = *profile
            .study_start_date
            .get_or_insert_with(|| self.clock.today());
        profile.current_day = 1;
        profile.updated_at = self.clock.now();

        let generated = generate_plan(&PlanRequest {
            user_id,
            topics: &profile.topics,
            total_days: profile.total_planned_days,
            start_date,
            hours_per_day: profile.hours_per_day,
        })?;
        for subject in &generated.skipped_subjects {
            warn!(%user_id, subject = %subject, "topic not found in curriculum");
        }
        if generated.compressed {
            info!(%user_id, total_days = profile.total_planned_days, "compressed plan to fit");
        }

        self.profiles.save_with_plan(&profile, &generated.days).await?;
        info!(%user_id, days = generated.days.len(), %start_date, "saved study plan");

        Ok(PlanOutcome {
            days: generated.days.len(),
            skipped_subjects: generated.skipped_subjects,
            compressed: generated.compressed,
        })
    }

    /// The plan row for the learner's current day, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` on backend failures.
    pub async fn today_plan(&self, user_id: UserId) -> Result<Option<StudyDay>, PlanServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        Ok(self.plans.find_day(user_id, profile.current_day).await?)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) when the day is not the
    /// user's and `PlanServiceError::Plan` for a bad task index.
    pub async fn complete_task(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        task_index: usize,
    ) -> Result<StudyDay, PlanServiceError> {
        let mut day = self.plans.get_day(plan_id).await?;
        if day.user_id != user_id {
            return Err(StorageError::NotFound.into());
        }
        day.complete_task(task_index, self.clock.now())?;
        self.plans.update_day(&day).await?;
        Ok(day)
    }

    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` on backend failures.
    pub async fn list_plan(&self, user_id: UserId) -> Result<Vec<StudyDay>, PlanServiceError> {
        Ok(self.plans.list_plan(user_id).await?)
    }

    /// The next `count` days after the current one.
    ///
    /// # Errors
    ///
    /// Returns `PlanServiceError::Storage` on backend failures.
    pub async fn upcoming(&self, user_id: UserId, count: usize) -> Result<Vec<StudyDay>, PlanServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        Ok(self
            .plans
            .list_plan(user_id)
            .await?
            .into_iter()
            .filter(|d| d.day_number > profile.current_day)
            .take(count)
            .collect())
    }
}
