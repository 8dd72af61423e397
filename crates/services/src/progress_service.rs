use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use storage::repository::{
    AnalyticsRepository, PlanRepository, ProfileRepository, QuizRepository, ResourceRepository,
};
use study_core::model::{DayStatus, UserId};
use study_core::progress::{
    self, Achievement, Rollover, TodaySummary, WeekSummary, rollover, week_start,
};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Totals shown on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StudyStats {
    pub total_planned_days: usize,
    pub completed_days: usize,
    pub completed_quizzes: usize,
    pub resources_uploaded: usize,
    pub current_day: u32,
    pub streak: u32,
    pub days_remaining: u32,
}

/// Moves learners through their plan and reports how they are doing.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    plans: Arc<dyn PlanRepository>,
    quizzes: Arc<dyn QuizRepository>,
    resources: Arc<dyn ResourceRepository>,
    analytics: Arc<dyn AnalyticsRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        plans: Arc<dyn PlanRepository>,
        quizzes: Arc<dyn QuizRepository>,
        resources: Arc<dyn ResourceRepository>,
        analytics: Arc<dyn AnalyticsRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            plans,
            quizzes,
            resources,
            analytics,
        }
    }

    /// Roll the learner forward if the calendar moved since their last visit.
    ///
    /// When it did, the day they left is auto-completed if all of its tasks
    /// were done and an analytics row is written for it, together with the
    /// profile, in one unit.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn check_and_update_day(&self, user_id: UserId) -> Result<Rollover, ProgressServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        let mut previous = self.plans.find_day(user_id, profile.current_day).await?;
        let now = self.clock.now();
        let result = rollover(&mut profile, self.clock.today(), previous.as_mut(), now);

        if !result.changed {
            if result.last_active.is_none() {
                self.profiles.save_profile(&profile).await?;
                debug!(%user_id, "recorded first visit");
            }
            return Ok(result);
        }

        match (previous, result.last_active) {
            (Some(plan), Some(date)) => {
                let day_quizzes = self.quizzes.list_for_day(user_id, result.previous_day).await?;
                let row = progress::day_analytics(&profile, date, &plan, &day_quizzes);
                self.profiles
                    .save_progress(&profile, std::slice::from_ref(&plan), Some(&row))
                    .await?;
            }
            _ => self.profiles.save_profile(&profile).await?,
        }
        info!(
            %user_id,
            from = result.previous_day,
            to = result.day_number,
            days_passed = result.days_passed,
            streak = profile.streak,
            "advanced study day"
        );
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn today_summary(&self, user_id: UserId) -> Result<TodaySummary, ProgressServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        let plan = self.plans.find_day(user_id, profile.current_day).await?;
        Ok(progress::today_summary(&profile, plan.as_ref()))
    }

    /// Finish today once every task is done and move to the next day.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoPlanToday` without a plan row for the
    /// current day and `ProgressServiceError::Progress` while tasks remain.
    pub async fn mark_day_complete(&self, user_id: UserId) -> Result<String, ProgressServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        let mut plan = self
            .plans
            .find_day(user_id, profile.current_day)
            .await?
            .ok_or(ProgressServiceError::NoPlanToday)?;
        let message = progress::complete_day(&mut profile, &mut plan, self.clock.today(), self.clock.now())?;
        self.profiles
            .save_progress(&profile, std::slice::from_ref(&plan), None)
            .await?;
        info!(%user_id, day = plan.day_number, "day completed");
        Ok(message)
    }

    /// Move to the next day even if tasks are left.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn force_advance(&self, user_id: UserId) -> Result<String, ProgressServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        let mut plan = self.plans.find_day(user_id, profile.current_day).await?;
        let message = progress::force_advance(&mut profile, plan.as_mut(), self.clock.today(), self.clock.now());
        let touched: Vec<_> = plan.into_iter().collect();
        self.profiles.save_progress(&profile, &touched, None).await?;
        info!(%user_id, day = profile.current_day, "forced advance");
        Ok(message)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn reset_to_day_one(&self, user_id: UserId) -> Result<(), ProgressServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        progress::reset_to_day_one(&mut profile, self.clock.today(), self.clock.now());
        self.profiles.save_profile(&profile).await?;
        info!(%user_id, "reset to day 1");
        Ok(())
    }

    /// Aggregate of the last seven days, `None` before any day was logged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn week_summary(&self, user_id: UserId) -> Result<Option<WeekSummary>, ProgressServiceError> {
        let today = self.clock.today();
        let rows = self
            .analytics
            .list_range(user_id, week_start(today), today)
            .await?;
        Ok(progress::week_summary(&rows))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn stats(&self, user_id: UserId) -> Result<StudyStats, ProgressServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        let plan = self.plans.list_plan(user_id).await?;
        let quizzes = self.quizzes.list_completed(user_id, None).await?;
        let resources = self.resources.list_resources(user_id).await?;

        let total = plan.len();
        let elapsed = usize::try_from(profile.current_day).unwrap_or(usize::MAX);
        let days_remaining = u32::try_from(total.saturating_sub(elapsed)).unwrap_or(u32::MAX);
        Ok(StudyStats {
            total_planned_days: total,
            completed_days: plan.iter().filter(|d| d.status == DayStatus::Completed).count(),
            completed_quizzes: quizzes.len(),
            resources_uploaded: resources.len(),
            current_day: profile.current_day,
            streak: profile.streak,
            days_remaining,
        })
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn achievements(&self, user_id: UserId) -> Result<Vec<Achievement>, ProgressServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        let quizzes = self.quizzes.list_completed(user_id, None).await?;
        Ok(progress::achievements(profile.streak, &quizzes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storage::repository::Storage;
    use study_core::curriculum::{PlanRequest, generate_plan};
    use study_core::progress::ProgressError;
    use study_core::time::fixed_now;

    use crate::testing::learner;

    struct Fixture {
        storage: Storage,
        user_id: UserId,
    }

    impl Fixture {
        async fn new() -> Self {
            let (storage, user) = learner(&["Python"]).await;
            let profile = storage.profiles.get_profile(user.id).await.unwrap();

            let plan = generate_plan(&PlanRequest {
                user_id: user.id,
                topics: &profile.topics,
                total_days: 8,
                start_date: fixed_now().date_naive(),
                hours_per_day: 4,
            })
            .unwrap();
            storage.plans.replace_plan(user.id, &plan.days).await.unwrap();
            Self {
                storage,
                user_id: user.id,
            }
        }

        fn service(&self, days_later: i64) -> ProgressService {
            let mut clock = Clock::fixed(fixed_now());
            clock.advance(Duration::days(days_later));
            ProgressService::new(
                clock,
                self.storage.profiles.clone(),
                self.storage.plans.clone(),
                self.storage.quizzes.clone(),
                self.storage.resources.clone(),
                self.storage.analytics.clone(),
            )
        }
    }

    #[tokio::test]
    async fn next_day_visit_advances_and_logs_the_previous_day() {
        let fx = Fixture::new().await;
        let first = fx.service(0).check_and_update_day(fx.user_id).await.unwrap();
        assert!(!first.changed);
        assert_eq!(first.message, "Welcome!");

        let again = fx.service(0).check_and_update_day(fx.user_id).await.unwrap();
        assert!(!again.changed);

        let next = fx.service(1).check_and_update_day(fx.user_id).await.unwrap();
        assert!(next.changed);
        assert_eq!(next.day_number, 2);
        assert_eq!(next.message, "Welcome to Day 2!");

        let profile = fx.storage.profiles.get_profile(fx.user_id).await.unwrap();
        assert_eq!(profile.streak, 1);
        let week = fx.service(1).week_summary(fx.user_id).await.unwrap().unwrap();
        assert_eq!(week.days_active, 1);
        assert_eq!(week.total_tasks, 0);
    }

    #[tokio::test]
    async fn long_absence_resets_the_streak() {
        let fx = Fixture::new().await;
        fx.service(0).check_and_update_day(fx.user_id).await.unwrap();
        fx.service(1).check_and_update_day(fx.user_id).await.unwrap();
        let late = fx.service(4).check_and_update_day(fx.user_id).await.unwrap();
        assert_eq!(late.days_passed, 3);
        assert_eq!(late.day_number, 5);
        assert!(late.message.contains("away for 3 days"));
        let profile = fx.storage.profiles.get_profile(fx.user_id).await.unwrap();
        assert_eq!(profile.streak, 1);
    }

    #[tokio::test]
    async fn completing_requires_every_task() {
        let fx = Fixture::new().await;
        let service = fx.service(0);
        assert!(matches!(
            service.mark_day_complete(fx.user_id).await,
            Err(ProgressServiceError::Progress(ProgressError::TasksIncomplete { done: 0, total: 3 }))
        ));

        let mut day = fx.storage.plans.find_day(fx.user_id, 1).await.unwrap().unwrap();
        for index in 0..day.tasks.len() {
            day.complete_task(index, fixed_now()).unwrap();
        }
        fx.storage.plans.update_day(&day).await.unwrap();

        let message = service.mark_day_complete(fx.user_id).await.unwrap();
        assert_eq!(message, "Day 1 completed! Moving to Day 2");
        let summary = service.today_summary(fx.user_id).await.unwrap();
        assert_eq!(summary.day_number, 2);
        assert_eq!(summary.streak, 1);

        let stats = service.stats(fx.user_id).await.unwrap();
        assert_eq!(stats.total_planned_days, 8);
        assert_eq!(stats.completed_days, 1);
        assert_eq!(stats.days_remaining, 6);
    }

    #[tokio::test]
    async fn force_advance_and_reset() {
        let fx = Fixture::new().await;
        let service = fx.service(0);
        service.force_advance(fx.user_id).await.unwrap();
        service.force_advance(fx.user_id).await.unwrap();
        assert_eq!(service.today_summary(fx.user_id).await.unwrap().day_number, 3);
        assert!(service.achievements(fx.user_id).await.unwrap().is_empty());

        service.reset_to_day_one(fx.user_id).await.unwrap();
        let profile = fx.storage.profiles.get_profile(fx.user_id).await.unwrap();
        assert_eq!(profile.current_day, 1);
        assert_eq!(profile.streak, 2);
    }

    #[tokio::test]
    async fn missing_plan_row_is_reported() {
        let fx = Fixture::new().await;
        fx.storage.plans.replace_plan(fx.user_id, &[]).await.unwrap();
        assert!(matches!(
            fx.service(0).mark_day_complete(fx.user_id).await,
            Err(ProgressServiceError::NoPlanToday)
        ));
        let summary = fx.service(0).today_summary(fx.user_id).await.unwrap();
        assert_eq!(summary.topic, "No plan");
    }
}
