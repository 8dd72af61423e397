#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod auth_service;
pub mod chat_service;
pub mod document_service;
pub mod error;
pub mod onboarding_service;
pub mod plan_service;
pub mod progress_service;
pub mod prompts;
pub mod quiz_service;
pub mod rag_service;
pub mod settings_service;

#[cfg(test)]
mod testing;

pub use study_core::Clock;

pub use ai::{
    CompletionRequest, EmbeddingConfig, EmbeddingKind, EmbeddingProvider, HashingEmbeddingProvider,
    HttpEmbeddingProvider, LanguageModel, LlmConfig, OpenAiCompatibleClient, complete_or,
    create_provider,
};
pub use app_services::{AppServices, ServicesConfig};
pub use auth_service::{AuthService, LoginSession, Registration, TokenSigner};
pub use chat_service::{ChatExchange, ChatService, SessionPreview};
pub use document_service::{DocumentService, Upload, UploadOutcome};
pub use error::{
    AppServicesError, AuthError, ChatServiceError, DocumentError, EmbeddingError, LlmError,
    OnboardingError, PlanServiceError, ProgressServiceError, QuizServiceError, SettingsError,
};
pub use onboarding_service::{OnboardingOutcome, OnboardingService};
pub use plan_service::{PlanOutcome, PlanService};
pub use progress_service::{ProgressService, StudyStats};
pub use quiz_service::{QuizDetail, QuizRequest, QuizService, SubmissionResult};
pub use rag_service::RagService;
pub use settings_service::{PreferenceUpdate, SettingsService};
