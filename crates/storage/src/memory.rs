use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use study_core::model::{
    ChatMessage, ChatSession, DailyAnalytics, PlanId, Quiz, QuizId, QuizResponse, QuizStatus,
    Resource, ResourceChunk, ResourceId, SessionId, StudentProfile, StudyDay, User, UserId,
};

use crate::repository::{
    AnalyticsRepository, ChatRepository, PlanRepository, ProfileRepository, QuizRepository,
    ResourceRepository, StorageError, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    profiles: HashMap<UserId, StudentProfile>,
    plans: HashMap<PlanId, StudyDay>,
    quizzes: HashMap<QuizId, Quiz>,
    responses: HashMap<QuizId, Vec<QuizResponse>>,
    sessions: HashMap<SessionId, ChatSession>,
    messages: HashMap<SessionId, Vec<ChatMessage>>,
    resources: HashMap<ResourceId, Resource>,
    chunks: HashMap<ResourceId, Vec<ResourceChunk>>,
    analytics: HashMap<(UserId, NaiveDate), DailyAnalytics>,
}

impl Tables {
    fn clear_owned_by(&mut self, user_id: UserId) {
        self.plans.retain(|_, d| d.user_id != user_id);

        let quiz_ids: Vec<QuizId> = self
            .quizzes
            .values()
            .filter(|q| q.user_id == user_id)
            .map(|q| q.id)
            .collect();
        for id in quiz_ids {
            self.quizzes.remove(&id);
            self.responses.remove(&id);
        }

        let session_ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        for id in session_ids {
            self.sessions.remove(&id);
            self.messages.remove(&id);
        }

        let resource_ids: Vec<ResourceId> = self
            .resources
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.id)
            .collect();
        for id in resource_ids {
            self.resources.remove(&id);
            self.chunks.remove(&id);
        }

        self.analytics.retain(|(owner, _), _| *owner != user_id);
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: &User, profile: &StudentProfile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let taken = guard
            .users
            .values()
            .any(|u| u.username == user.username || u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(StorageError::Conflict("username or email already registered".into()));
        }
        guard.users.insert(user.id, user.clone());
        guard.profiles.insert(user.id, profile.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let guard = self.lock()?;
        guard.users.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.values().find(|u| u.matches_login(login)).cloned())
    }

    async fn login_taken(&self, username: &str, email: &str) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .any(|u| u.username == username || u.email.eq_ignore_ascii_case(email)))
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.users.get_mut(&user.id).ok_or(StorageError::NotFound)?;
        *slot = user.clone();
        Ok(())
    }

    async fn clear_user_data(&self, id: UserId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.clear_owned_by(id);
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.users.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        guard.profiles.remove(&id);
        guard.clear_owned_by(id);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<StudentProfile, StorageError> {
        let guard = self.lock()?;
        guard.profiles.get(&user_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn save_profile(&self, profile: &StudentProfile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn save_progress(
        &self,
        profile: &StudentProfile,
        days: &[StudyDay],
        analytics: Option<&DailyAnalytics>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if days.iter().any(|d| !guard.plans.contains_key(&d.id)) {
            return Err(StorageError::NotFound);
        }
        guard.profiles.insert(profile.user_id, profile.clone());
        for day in days {
            guard.plans.insert(day.id, day.clone());
        }
        if let Some(row) = analytics {
            guard.analytics.insert((row.user_id, row.date), row.clone());
        }
        Ok(())
    }

    async fn save_with_plan(&self, profile: &StudentProfile, days: &[StudyDay]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.profiles.insert(profile.user_id, profile.clone());
        guard.plans.retain(|_, d| d.user_id != profile.user_id);
        for day in days {
            guard.plans.insert(day.id, day.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn replace_plan(&self, user_id: UserId, days: &[StudyDay]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.plans.retain(|_, d| d.user_id != user_id);
        for day in days {
            guard.plans.insert(day.id, day.clone());
        }
        Ok(())
    }

    async fn get_day(&self, id: PlanId) -> Result<StudyDay, StorageError> {
        let guard = self.lock()?;
        guard.plans.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_day(&self, user_id: UserId, day_number: u32) -> Result<Option<StudyDay>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .plans
            .values()
            .find(|d| d.user_id == user_id && d.day_number == day_number)
            .cloned())
    }

    async fn list_plan(&self, user_id: UserId) -> Result<Vec<StudyDay>, StorageError> {
        let guard = self.lock()?;
        let mut days: Vec<StudyDay> = guard
            .plans
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        days.sort_by_key(|d| d.day_number);
        Ok(days)
    }

    async fn update_day(&self, day: &StudyDay) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.plans.get_mut(&day.id).ok_or(StorageError::NotFound)?;
        *slot = day.clone();
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.quizzes.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let guard = self.lock()?;
        guard.quizzes.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn complete_quiz(&self, quiz: &Quiz, responses: &[QuizResponse]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.quizzes.get_mut(&quiz.id).ok_or(StorageError::NotFound)?;
        *slot = quiz.clone();
        guard.responses.insert(quiz.id, responses.to_vec());
        Ok(())
    }

    async fn list_completed(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.lock()?;
        let mut quizzes: Vec<Quiz> = guard
            .quizzes
            .values()
            .filter(|q| q.user_id == user_id && q.status == QuizStatus::Completed)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        if let Some(limit) = limit {
            quizzes.truncate(limit as usize);
        }
        Ok(quizzes)
    }

    async fn list_for_day(&self, user_id: UserId, day_number: u32) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .quizzes
            .values()
            .filter(|q| {
                q.user_id == user_id
                    && q.day_number == Some(day_number)
                    && q.status == QuizStatus::Completed
            })
            .cloned()
            .collect())
    }

    async fn list_responses(&self, quiz_id: QuizId) -> Result<Vec<QuizResponse>, StorageError> {
        let guard = self.lock()?;
        let mut responses = guard.responses.get(&quiz_id).cloned().unwrap_or_default();
        responses.sort_by_key(|r| r.graded.question_number);
        Ok(responses)
    }
}

#[async_trait]
impl ChatRepository for InMemoryRepository {
    async fn open_session(&self, user_id: UserId) -> Result<Option<ChatSession>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_open())
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<ChatSession, StorageError> {
        let guard = self.lock()?;
        guard.sessions.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn update_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.sessions.get_mut(&session.id).ok_or(StorageError::NotFound)?;
        *slot = session.clone();
        Ok(())
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, StorageError> {
        let guard = self.lock()?;
        let mut sessions: Vec<ChatSession> = guard
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn append_message(&self, session: &ChatSession, message: &ChatMessage) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.sessions.get_mut(&session.id).ok_or(StorageError::NotFound)?;
        *slot = session.clone();
        guard
            .messages
            .entry(session.id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn recent_messages(&self, session_id: SessionId, limit: u32) -> Result<Vec<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        let messages = guard.messages.get(&session_id).cloned().unwrap_or_default();
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn first_message(&self, session_id: SessionId) -> Result<Option<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .messages
            .get(&session_id)
            .and_then(|m| m.first())
            .cloned())
    }
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    async fn insert_resource(&self, resource: &Resource) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.resources.insert(resource.id, resource.clone());
        Ok(())
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Resource, StorageError> {
        let guard = self.lock()?;
        guard.resources.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_resources(&self, user_id: UserId) -> Result<Vec<Resource>, StorageError> {
        let guard = self.lock()?;
        let mut resources: Vec<Resource> = guard
            .resources
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        resources.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(resources)
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.resources.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        guard.chunks.remove(&id);
        Ok(())
    }

    async fn store_chunks(&self, id: ResourceId, chunks: &[ResourceChunk]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let resource = guard.resources.get_mut(&id).ok_or(StorageError::NotFound)?;
        resource.embeddings_generated = true;
        guard.chunks.insert(id, chunks.to_vec());
        Ok(())
    }

    async fn list_chunks(&self, id: ResourceId) -> Result<Vec<ResourceChunk>, StorageError> {
        let guard = self.lock()?;
        let mut chunks = guard.chunks.get(&id).cloned().unwrap_or_default();
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryRepository {
    async fn record_day(&self, row: &DailyAnalytics) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.analytics.insert((row.user_id, row.date), row.clone());
        Ok(())
    }

    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<DailyAnalytics> = guard
            .analytics
            .values()
            .filter(|r| r.user_id == user_id && r.date >= from && r.date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::NewUser;
    use study_core::time::fixed_now;

    fn user(name: &str) -> User {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            full_name: "Test User".into(),
            age_group: None,
        }
        .into_user(UserId::generate(), fixed_now())
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let repo = InMemoryRepository::new();
        let ada = user("ada");
        repo.create_user(&ada, &StudentProfile::new(ada.id, fixed_now()))
            .await
            .unwrap();

        let mut twin = user("ada2");
        twin.email = "ADA@example.com".into();
        let err = repo
            .create_user(&twin, &StudentProfile::new(twin.id, fixed_now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        assert!(repo.login_taken("ada", "x@example.com").await.unwrap());
        assert_eq!(
            repo.find_by_login("ada@example.com").await.unwrap().map(|u| u.id),
            Some(ada.id)
        );
        assert_eq!(repo.get_profile(ada.id).await.unwrap().current_day, 1);
    }

    #[tokio::test]
    async fn deleting_user_removes_owned_rows() {
        let repo = InMemoryRepository::new();
        let ada = user("ada");
        repo.create_user(&ada, &StudentProfile::new(ada.id, fixed_now()))
            .await
            .unwrap();
        let session = ChatSession::open(ada.id, Default::default(), fixed_now());
        repo.insert_session(&session).await.unwrap();
        repo.record_day(&DailyAnalytics::empty(ada.id, fixed_now().date_naive()))
            .await
            .unwrap();

        repo.delete_user(ada.id).await.unwrap();

        assert!(matches!(repo.get_user(ada.id).await, Err(StorageError::NotFound)));
        assert!(repo.list_sessions(ada.id).await.unwrap().is_empty());
        let day = fixed_now().date_naive();
        assert!(repo.list_range(ada.id, day, day).await.unwrap().is_empty());
    }
}
