//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::grading::QuizError;
use study_core::model::PlanError;
use study_core::progress::ProgressError;
use study_core::validate::ValidationError;

/// Errors emitted by the chat-completions client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmError {
    #[error("language model is not configured")]
    Disabled,
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("language model request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by embedding providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbeddingError {
    #[error("embedding provider requires an API key")]
    MissingApiKey,
    #[error("embedding request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Username or email already exists")]
    Taken,
    #[error("Invalid username/email or password")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    Inactive,
    #[error("Current password is incorrect")]
    WrongPassword,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PlanService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanServiceError {
    #[error("No topics selected")]
    NoTopics,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `OnboardingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OnboardingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Plan(#[from] PlanServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("No plan found for today")]
    NoPlanToday,
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("Quiz already completed")]
    AlreadyCompleted,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DocumentService` and `RagService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to extract text from PDF. File might be empty or corrupted.")]
    ExtractionFailed,
    #[error("No text chunks created")]
    NoChunks,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
