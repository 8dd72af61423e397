use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use storage::repository::{PlanRepository, ProfileRepository, UserRepository};
use study_core::model::{StudentProfile, UserId, planned_days};
use study_core::progress::reset_progress;
use study_core::validate::{self, MAX_TOPICS, ValidationError};

use crate::Clock;
use crate::document_service::DocumentService;
use crate::error::SettingsError;

/// Changes from the study preferences form; absent fields stay as they are.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub hours_per_day: Option<u32>,
    #[serde(default)]
    pub remove_topics: Vec<String>,
    pub add_topic: Option<String>,
}

/// Preference edits and the destructive account actions.
#[derive(Clone)]
pub struct SettingsService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    plans: Arc<dyn PlanRepository>,
    documents: DocumentService,
}

impl SettingsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        plans: Arc<dyn PlanRepository>,
        documents: DocumentService,
    ) -> Self {
        Self {
            clock,
            users,
            profiles,
            plans,
            documents,
        }
    }

    /// Edit hours and topics; planned days follow the new topic count.
    ///
    /// The existing plan is left as it is until it is regenerated.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Validation` for bad hours, a duplicate topic,
    /// too many topics or removing every topic.
    pub async fn update_preferences(
        &self,
        user_id: UserId,
        update: PreferenceUpdate,
    ) -> Result<StudentProfile, SettingsError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        if let Some(hours) = update.hours_per_day {
            validate::hours_per_day(hours)?;
            profile.hours_per_day = hours;
        }

        let before = profile.topics.len();
        profile.topics.retain(|t| !update.remove_topics.contains(t));
        for removed in &update.remove_topics {
            profile.levels.remove(removed);
        }
        if let Some(topic) = update.add_topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if profile.topics.iter().any(|t| t == topic) {
                return Err(ValidationError::new(format!("'{topic}' is already in your topics")).into());
            }
            if profile.topics.len() >= MAX_TOPICS {
                return Err(ValidationError::new(format!("Maximum {MAX_TOPICS} topics allowed")).into());
            }
            profile.topics.push(topic.to_string());
        }
        if profile.topics.is_empty() && before > 0 {
            return Err(ValidationError::new("You must keep at least one topic").into());
        }

        if profile.topics.len() != before || update.add_topic.is_some() {
            let (total, remaining) = planned_days(profile.topics.len(), profile.target_date, self.clock.today());
            profile.total_planned_days = total.max(1);
            profile.days_remaining = remaining;
        }
        profile.updated_at = self.clock.now();
        self.profiles.save_profile(&profile).await?;
        info!(%user_id, topics = profile.topics.len(), hours = profile.hours_per_day, "updated preferences");
        Ok(profile)
    }

    /// Back to day 1 with no streak and every plan day pending.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Storage` on backend failures.
    pub async fn reset_progress(&self, user_id: UserId) -> Result<(), SettingsError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        let mut days = self.plans.list_plan(user_id).await?;
        reset_progress(&mut profile, &mut days, self.clock.now());
        self.profiles.save_progress(&profile, &days, None).await?;
        info!(%user_id, days = days.len(), "reset progress");
        Ok(())
    }

    /// Remove plans, quizzes, chats, documents and analytics but keep the
    /// account; onboarding has to be done again.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Storage` on backend failures.
    pub async fn delete_all_data(&self, user_id: UserId) -> Result<(), SettingsError> {
        let files = self.documents.remove_files(user_id).await?;
        self.users.clear_user_data(user_id).await?;
        let mut profile = self.profiles.get_profile(user_id).await?;
        profile.clear_onboarding(self.clock.now());
        self.profiles.save_profile(&profile).await?;
        info!(%user_id, files, "deleted all study data");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for an unknown user.
    pub async fn delete_account(&self, user_id: UserId) -> Result<(), SettingsError> {
        let files = self.documents.remove_files(user_id).await?;
        self.users.delete_user(user_id).await?;
        info!(%user_id, files, "deleted account");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{Storage, StorageError};
    use study_core::curriculum::{PlanRequest, generate_plan};
    use study_core::model::DayStatus;
    use study_core::time::fixed_now;

    use crate::ai::HashingEmbeddingProvider;
    use crate::rag_service::RagService;
    use crate::testing::learner;

    fn service(storage: &Storage, dir: &std::path::Path) -> SettingsService {
        let clock = Clock::fixed(fixed_now());
        let rag = RagService::new(storage.resources.clone(), Arc::new(HashingEmbeddingProvider::new(32)));
        let documents = DocumentService::new(clock, storage.resources.clone(), rag, dir, false);
        SettingsService::new(
            clock,
            storage.users.clone(),
            storage.profiles.clone(),
            storage.plans.clone(),
            documents,
        )
    }

    #[tokio::test]
    async fn topics_can_be_swapped_but_not_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Python", "DBMS"]).await;
        let service = service(&storage, dir.path());

        let profile = service
            .update_preferences(
                user.id,
                PreferenceUpdate {
                    hours_per_day: Some(2),
                    remove_topics: vec!["DBMS".into()],
                    add_topic: Some("Java".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.topics, vec!["Python".to_string(), "Java".to_string()]);
        assert_eq!(profile.hours_per_day, 2);
        assert_eq!(profile.total_planned_days, 20);

        assert!(matches!(
            service
                .update_preferences(
                    user.id,
                    PreferenceUpdate {
                        add_topic: Some("Java".into()),
                        ..PreferenceUpdate::default()
                    },
                )
                .await,
            Err(SettingsError::Validation(_))
        ));
        assert!(matches!(
            service
                .update_preferences(
                    user.id,
                    PreferenceUpdate {
                        remove_topics: vec!["Python".into(), "Java".into()],
                        ..PreferenceUpdate::default()
                    },
                )
                .await,
            Err(SettingsError::Validation(_))
        ));
        assert!(matches!(
            service
                .update_preferences(
                    user.id,
                    PreferenceUpdate {
                        hours_per_day: Some(17),
                        ..PreferenceUpdate::default()
                    },
                )
                .await,
            Err(SettingsError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reset_and_delete_keep_or_remove_the_account() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Python"]).await;
        let plan = generate_plan(&PlanRequest {
            user_id: user.id,
            topics: &["Python".to_string()],
            total_days: 8,
            start_date: fixed_now().date_naive(),
            hours_per_day: 4,
        })
        .unwrap();
        storage.plans.replace_plan(user.id, &plan.days).await.unwrap();
        let mut day = plan.days[0].clone();
        day.mark_completed(fixed_now());
        storage.plans.update_day(&day).await.unwrap();

        let service = service(&storage, dir.path());
        service.reset_progress(user.id).await.unwrap();
        let days = storage.plans.list_plan(user.id).await.unwrap();
        assert!(days.iter().all(|d| d.status == DayStatus::Pending));

        service.delete_all_data(user.id).await.unwrap();
        assert!(storage.plans.list_plan(user.id).await.unwrap().is_empty());
        let profile = storage.profiles.get_profile(user.id).await.unwrap();
        assert!(!profile.onboarding_completed);
        assert!(storage.users.get_user(user.id).await.is_ok());

        service.delete_account(user.id).await.unwrap();
        assert!(matches!(
            storage.users.get_user(user.id).await,
            Err(StorageError::NotFound)
        ));
    }
}
