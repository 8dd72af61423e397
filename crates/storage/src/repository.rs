use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use study_core::model::{
    ChatMessage, ChatSession, DailyAnalytics, PlanId, Quiz, QuizId, QuizResponse, Resource,
    ResourceChunk, ResourceId, SessionId, StudentProfile, StudyDay, User, UserId,
};
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── USERS & PROFILES ──────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account together with its profile as one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn create_user(&self, user: &User, profile: &StudentProfile) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such user exists.
    async fn get_user(&self, id: UserId) -> Result<User, StorageError>;

    /// Look a user up by exact username or case-insensitive email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError>;

    /// Whether the username or email is already registered.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn login_taken(&self, username: &str, email: &str) -> Result<bool, StorageError>;

    /// Persist mutable account fields (name, password hash, active flag, last login).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn update_user(&self, user: &User) -> Result<(), StorageError>;

    /// Remove everything owned by the user except the account and profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_user_data(&self, id: UserId) -> Result<(), StorageError>;

    /// Remove the account and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no profile.
    async fn get_profile(&self, user_id: UserId) -> Result<StudentProfile, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn save_profile(&self, profile: &StudentProfile) -> Result<(), StorageError>;

    /// Store a profile and the plan rows a progression step touched, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is applied then.
    async fn save_progress(
        &self,
        profile: &StudentProfile,
        days: &[StudyDay],
        analytics: Option<&DailyAnalytics>,
    ) -> Result<(), StorageError>;

    /// Store a profile and replace the user's whole plan with `days`, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; the old profile and plan
    /// are kept then.
    async fn save_with_plan(&self, profile: &StudentProfile, days: &[StudyDay]) -> Result<(), StorageError>;
}

//
// ─── PLANS ─────────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Drop the user's plan and insert `days` in its place, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; the old plan is kept then.
    async fn replace_plan(&self, user_id: UserId, days: &[StudyDay]) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn get_day(&self, id: PlanId) -> Result<StudyDay, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_day(&self, user_id: UserId, day_number: u32) -> Result<Option<StudyDay>, StorageError>;

    /// All rows ordered by day number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_plan(&self, user_id: UserId) -> Result<Vec<StudyDay>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn update_day(&self, day: &StudyDay) -> Result<(), StorageError>;
}

//
// ─── QUIZZES ───────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError>;

    /// Store the graded quiz and its responses as one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn complete_quiz(&self, quiz: &Quiz, responses: &[QuizResponse]) -> Result<(), StorageError>;

    /// Completed quizzes, most recently attempted first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_completed(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<Quiz>, StorageError>;

    /// Completed quizzes taken on a given plan day.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_for_day(&self, user_id: UserId, day_number: u32) -> Result<Vec<Quiz>, StorageError>;

    /// Responses ordered by question number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_responses(&self, quiz_id: QuizId) -> Result<Vec<QuizResponse>, StorageError>;
}

//
// ─── CHAT ──────────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// The user's session that has not been ended, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn open_session(&self, user_id: UserId) -> Result<Option<ChatSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn insert_session(&self, session: &ChatSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn get_session(&self, id: SessionId) -> Result<ChatSession, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_session(&self, session: &ChatSession) -> Result<(), StorageError>;

    /// Sessions newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, StorageError>;

    /// Insert a message and store the session counters it bumped, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn append_message(&self, session: &ChatSession, message: &ChatMessage) -> Result<(), StorageError>;

    /// The latest `limit` messages in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn recent_messages(&self, session_id: SessionId, limit: u32) -> Result<Vec<ChatMessage>, StorageError>;

    /// The first message in the session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn first_message(&self, session_id: SessionId) -> Result<Option<ChatMessage>, StorageError>;
}

//
// ─── RESOURCES ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the resource cannot be stored.
    async fn insert_resource(&self, resource: &Resource) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn get_resource(&self, id: ResourceId) -> Result<Resource, StorageError>;

    /// Resources newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_resources(&self, user_id: UserId) -> Result<Vec<Resource>, StorageError>;

    /// Remove the resource row and its chunks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn delete_resource(&self, id: ResourceId) -> Result<(), StorageError>;

    /// Replace a resource's chunks and mark it embedded, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn store_chunks(&self, id: ResourceId, chunks: &[ResourceChunk]) -> Result<(), StorageError>;

    /// Chunks in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_chunks(&self, id: ResourceId) -> Result<Vec<ResourceChunk>, StorageError>;
}

//
// ─── ANALYTICS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Insert or replace the row for `(user, date)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn record_day(&self, row: &DailyAnalytics) -> Result<(), StorageError>;

    /// Rows with `from <= date <= to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, StorageError>;
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub chats: Arc<dyn ChatRepository>,
    pub resources: Arc<dyn ResourceRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every repository slot to clones of one backend.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + ProfileRepository
            + PlanRepository
            + QuizRepository
            + ChatRepository
            + ResourceRepository
            + AnalyticsRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            plans: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            chats: Arc::new(repo.clone()),
            resources: Arc::new(repo.clone()),
            analytics: Arc::new(repo),
        }
    }
}
