use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use storage::repository::{ProfileRepository, UserRepository};
use study_core::curriculum::is_known_subject;
use study_core::model::{OnboardingChoices, PlanError, StudentProfile, UserId};
use study_core::validate;

use crate::Clock;
use crate::ai::{CompletionRequest, LanguageModel, complete_or};
use crate::error::{OnboardingError, PlanServiceError};
use crate::plan_service::{PlanOutcome, PlanService};
use crate::prompts;

const GREETING_TOKENS: u32 = 150;
const SUMMARY_TOKENS: u32 = 250;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OnboardingOutcome {
    pub profile: StudentProfile,
    pub plan: PlanOutcome,
    /// Set when the chosen pace is unusually heavy.
    pub warning: Option<String>,
}

/// First-run setup: topics, levels, pace and the initial plan.
#[derive(Clone)]
pub struct OnboardingService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    plans: PlanService,
    model: Arc<dyn LanguageModel>,
}

impl OnboardingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        plans: PlanService,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            clock,
            users,
            profiles,
            plans,
            model,
        }
    }

    pub async fn greeting(&self) -> String {
        let request = CompletionRequest::new(prompts::onboarding_greeting()).max_tokens(GREETING_TOKENS);
        complete_or(self.model.as_ref(), request, prompts::ONBOARDING_GREETING_FALLBACK).await
    }

    /// Apply the learner's choices and build their plan.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Validation` for bad choices and
    /// `OnboardingError::Plan` when no plan can be built from the topics.
    pub async fn save(&self, user_id: UserId, mut choices: OnboardingChoices) -> Result<OnboardingOutcome, OnboardingError> {
        choices.topics = choices
            .topics
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        validate::topics(&choices.topics)?;
        let today = self.clock.today();
        validate::target_date(choices.target_date, today)?;
        let warning = validate::hours_per_day(choices.hours_per_day)?.map(str::to_string);
        if !choices.topics.iter().any(|t| is_known_subject(t)) {
            return Err(PlanServiceError::Plan(PlanError::NoSubtopics).into());
        }

        let mut profile = self.profiles.get_profile(user_id).await?;
        profile.apply_onboarding(choices, today, self.clock.now());
        self.profiles.save_profile(&profile).await?;
        info!(
            %user_id,
            topics = profile.topics.len(),
            total_days = profile.total_planned_days,
            "saved onboarding"
        );

        let plan = self.plans.generate_full_plan(user_id).await?;
        let profile = self.profiles.get_profile(user_id).await?;
        Ok(OnboardingOutcome {
            profile,
            plan,
            warning,
        })
    }

    /// Motivating recap of the learner's choices.
    ///
    /// # Errors
    ///
    /// Returns `OnboardingError::Storage` on backend failures.
    pub async fn summary(&self, user_id: UserId) -> Result<String, OnboardingError> {
        let user = self.users.get_user(user_id).await?;
        let profile = self.profiles.get_profile(user_id).await?;
        let topics: Vec<_> = profile
            .topics
            .iter()
            .map(|t| (t.clone(), profile.level_for(t)))
            .collect();
        let target = profile.target_date.map(|d| d.format("%Y-%m-%d").to_string());
        let prompt = prompts::onboarding_summary(&user.full_name, &topics, profile.hours_per_day, target.as_deref());
        let fallback = prompts::onboarding_summary_fallback(&profile.topics, profile.hours_per_day);
        let request = CompletionRequest::new(prompt).max_tokens(SUMMARY_TOKENS);
        Ok(complete_or(self.model.as_ref(), request, &fallback).await)
    }
}
