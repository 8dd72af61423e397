//! Mapping from service errors to HTTP responses.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use services::{
    AuthError, ChatServiceError, DocumentError, LlmError, OnboardingError, PlanServiceError,
    ProgressServiceError, QuizServiceError, SettingsError,
};
use storage::repository::StorageError;
use study_core::model::PlanError;
use study_core::validate::ValidationError;

/// Error returned by every handler; rendered as `{ "error": "..." }`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("AI service error: {0}")]
    Upstream(String),
    #[error("AI features are not configured")]
    Unavailable,
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::Conflict(detail) => Self::Conflict(detail),
            other => Self::internal(other),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Disabled => Self::Unavailable,
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(e) => e.into(),
            AuthError::Taken => Self::Conflict(err.to_string()),
            AuthError::WrongPassword => Self::BadRequest(err.to_string()),
            AuthError::InvalidCredentials
            | AuthError::Inactive
            | AuthError::InvalidToken
            | AuthError::TokenExpired => Self::Unauthorized(err.to_string()),
            AuthError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<PlanServiceError> for ApiError {
    fn from(err: PlanServiceError) -> Self {
        match err {
            PlanServiceError::NoTopics => Self::BadRequest(err.to_string()),
            PlanServiceError::Plan(PlanError::NoSubtopics) => Self::BadRequest(
                "None of the selected topics has a curriculum yet".to_string(),
            ),
            PlanServiceError::Plan(e) => Self::BadRequest(e.to_string()),
            PlanServiceError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::Validation(e) => e.into(),
            OnboardingError::Plan(e) => e.into(),
            OnboardingError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::NoPlanToday => Self::NotFound,
            ProgressServiceError::Progress(e) => Self::BadRequest(e.to_string()),
            ProgressServiceError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<QuizServiceError> for ApiError {
    fn from(err: QuizServiceError) -> Self {
        match err {
            QuizServiceError::AlreadyCompleted => Self::Conflict(err.to_string()),
            QuizServiceError::Validation(e) => e.into(),
            QuizServiceError::Quiz(e) => Self::Upstream(e.to_string()),
            QuizServiceError::Llm(e) => e.into(),
            QuizServiceError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::Validation(e) => e.into(),
            ChatServiceError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(e) => e.into(),
            DocumentError::ExtractionFailed | DocumentError::NoChunks => {
                Self::BadRequest(err.to_string())
            }
            DocumentError::Embedding(e) => Self::Upstream(e.to_string()),
            DocumentError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Validation(e) => e.into(),
            SettingsError::Storage(e) => e.into(),
            other => Self::internal(other),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
