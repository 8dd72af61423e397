use std::path::PathBuf;
use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::ai::{EmbeddingConfig, EmbeddingProvider, LanguageModel, LlmConfig, OpenAiCompatibleClient, create_provider};
use crate::auth_service::{AuthService, DEFAULT_TOKEN_TTL_HOURS, TokenSigner};
use crate::chat_service::ChatService;
use crate::document_service::DocumentService;
use crate::error::AppServicesError;
use crate::onboarding_service::OnboardingService;
use crate::plan_service::PlanService;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::rag_service::RagService;
use crate::settings_service::SettingsService;

/// Settings the services need beyond storage.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    /// `None` disables every model-backed feature; fallbacks are used instead.
    pub llm: Option<LlmConfig>,
    pub embeddings: EmbeddingConfig,
    pub embed_on_upload: bool,
}

impl ServicesConfig {
    #[must_use]
    pub fn new(token_secret: impl Into<String>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            upload_dir: upload_dir.into(),
            llm: None,
            embeddings: EmbeddingConfig::default(),
            embed_on_upload: true,
        }
    }
}

/// Assembles every app-facing service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    onboarding: Arc<OnboardingService>,
    plans: Arc<PlanService>,
    progress: Arc<ProgressService>,
    quizzes: Arc<QuizService>,
    chat: Arc<ChatService>,
    documents: Arc<DocumentService>,
    rag: Arc<RagService>,
    settings: Arc<SettingsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, migrating it first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage cannot be opened or the
    /// embedding provider cannot be configured.
    pub async fn new_sqlite(db_url: &str, clock: Clock, config: ServicesConfig) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiCompatibleClient::new(config.llm.clone()));
        let embedder = create_provider(&config.embeddings)?;
        Ok(Self::from_storage(&storage, clock, model, embedder, &config))
    }

    /// Wire services over an existing backend and model clients.
    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &ServicesConfig,
    ) -> Self {
        let tokens = TokenSigner::new(
            config.token_secret.as_bytes(),
            chrono::Duration::hours(config.token_ttl_hours.max(1)),
        );
        let auth = AuthService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.profiles),
            tokens,
        );
        let plans = PlanService::new(clock, Arc::clone(&storage.profiles), Arc::clone(&storage.plans));
        let onboarding = OnboardingService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.profiles),
            plans.clone(),
            Arc::clone(&model),
        );
        let progress = ProgressService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.resources),
            Arc::clone(&storage.analytics),
        );
        let quizzes = QuizService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.quizzes),
            Arc::clone(&model),
        );
        let rag = RagService::new(Arc::clone(&storage.resources), embedder);
        let chat = ChatService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.chats),
            model,
            rag.clone(),
        );
        let documents = DocumentService::new(
            clock,
            Arc::clone(&storage.resources),
            rag.clone(),
            config.upload_dir.clone(),
            config.embed_on_upload,
        );
        let settings = SettingsService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.plans),
            documents.clone(),
        );

        Self {
            auth: Arc::new(auth),
            onboarding: Arc::new(onboarding),
            plans: Arc::new(plans),
            progress: Arc::new(progress),
            quizzes: Arc::new(quizzes),
            chat: Arc::new(chat),
            documents: Arc::new(documents),
            rag: Arc::new(rag),
            settings: Arc::new(settings),
        }
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn onboarding(&self) -> Arc<OnboardingService> {
        Arc::clone(&self.onboarding)
    }

    #[must_use]
    pub fn plans(&self) -> Arc<PlanService> {
        Arc::clone(&self.plans)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn documents(&self) -> Arc<DocumentService> {
        Arc::clone(&self.documents)
    }

    #[must_use]
    pub fn rag(&self) -> Arc<RagService> {
        Arc::clone(&self.rag)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }
}
