use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use storage::repository::{ChatRepository, PlanRepository, ProfileRepository, QuizRepository, StorageError};
use study_core::chat::{LearnerContext, detect_intent, document_routing};
use study_core::model::{ChatMessage, ChatSession, DayStatus, Role, SessionContext, SessionId, UserId};
use study_core::retrieval::DEFAULT_TOP_K;
use study_core::validate;

use crate::Clock;
use crate::ai::{CompletionRequest, LanguageModel, complete_or};
use crate::error::ChatServiceError;
use crate::prompts;
use crate::rag_service::RagService;

/// Messages of earlier conversation shown to the model.
pub const HISTORY_TURNS: u32 = 5;
/// Completed quizzes the tutor is told about.
pub const CONTEXT_QUIZZES: u32 = 5;
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
const PREVIEW_CHARS: usize = 50;
const GREETING_TOKENS: u32 = 200;

/// A session with the start of its first message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionPreview {
    #[serde(flatten)]
    pub session: ChatSession,
    pub preview: Option<String>,
}

/// Both sides of one chat turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatExchange {
    pub session_id: SessionId,
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
}

/// Progress-aware tutor chat, optionally grounded in uploaded documents.
#[derive(Clone)]
pub struct ChatService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    plans: Arc<dyn PlanRepository>,
    quizzes: Arc<dyn QuizRepository>,
    chats: Arc<dyn ChatRepository>,
    model: Arc<dyn LanguageModel>,
    rag: RagService,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        plans: Arc<dyn PlanRepository>,
        quizzes: Arc<dyn QuizRepository>,
        chats: Arc<dyn ChatRepository>,
        model: Arc<dyn LanguageModel>,
        rag: RagService,
    ) -> Self {
        Self {
            clock,
            profiles,
            plans,
            quizzes,
            chats,
            model,
            rag,
        }
    }

    //
    // ─── SESSIONS ──────────────────────────────────────────────────────────────
    //

    /// The user's open session, or a new one seeded with today's day and topic.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn get_or_create_session(&self, user_id: UserId) -> Result<ChatSession, ChatServiceError> {
        if let Some(session) = self.chats.open_session(user_id).await? {
            return Ok(session);
        }
        let now = self.clock.now();
        let profile = self.profiles.get_profile(user_id).await?;
        let today = self.plans.find_day(user_id, profile.current_day).await?;
        let context = SessionContext {
            current_day: profile.current_day,
            current_topic: today.map(|d| d.topic),
            last_interaction: Some(now),
        };
        let session = ChatSession::open(user_id, context, now);
        self.chats.insert_session(&session).await?;
        debug!(%user_id, session_id = %session.id, "opened chat session");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign session.
    pub async fn end_session(&self, user_id: UserId, session_id: SessionId) -> Result<ChatSession, ChatServiceError> {
        let mut session = self.owned(user_id, session_id).await?;
        if session.ended_at.is_none() {
            session.ended_at = Some(self.clock.now());
            self.chats.update_session(&session).await?;
        }
        Ok(session)
    }

    /// Sessions newest first, each with the start of its first message.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionPreview>, ChatServiceError> {
        let sessions = self.chats.list_sessions(user_id).await?;
        let mut previews = Vec::with_capacity(sessions.len());
        for session in sessions {
            let preview = self
                .chats
                .first_message(session.id)
                .await?
                .map(|m| preview(&m.content));
            previews.push(SessionPreview { session, preview });
        }
        Ok(previews)
    }

    /// The latest `limit` messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign session.
    pub async fn history(
        &self,
        user_id: UserId,
        session_id: SessionId,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, ChatServiceError> {
        self.owned(user_id, session_id).await?;
        Ok(self
            .chats
            .recent_messages(session_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await?)
    }

    /// Store a message and bump the session counters.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn add_message(
        &self,
        session: &mut ChatSession,
        role: Role,
        content: impl Into<String>,
    ) -> Result<ChatMessage, ChatServiceError> {
        let now = self.clock.now();
        let message = ChatMessage::new(session.id, role, content, now);
        session.message_count = session.message_count.saturating_add(1);
        session.context.last_interaction = Some(now);
        self.chats.append_message(session, &message).await?;
        Ok(message)
    }

    async fn owned(&self, user_id: UserId, session_id: SessionId) -> Result<ChatSession, ChatServiceError> {
        let session = self.chats.get_session(session_id).await?;
        if session.user_id != user_id {
            return Err(StorageError::NotFound.into());
        }
        Ok(session)
    }

    //
    // ─── TUTOR ─────────────────────────────────────────────────────────────────
    //

    /// Progress facts for the tutor prompt.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn user_context(&self, user_id: UserId) -> Result<LearnerContext, ChatServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        let plan = self.plans.list_plan(user_id).await?;
        let recent = self.quizzes.list_completed(user_id, Some(CONTEXT_QUIZZES)).await?;
        let today = plan.iter().find(|d| d.day_number == profile.current_day);
        let completed = plan.iter().filter(|d| d.status == DayStatus::Completed).count();
        Ok(LearnerContext::build(&profile, today, &recent, plan.len(), completed))
    }

    /// Tutor reply to `message`; `history` is the conversation before it,
    /// oldest first.
    ///
    /// Never fails on the model: a fixed apology is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn generate_reply(
        &self,
        user_id: UserId,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String, ChatServiceError> {
        let context = self.user_context(user_id).await?;
        let base = prompts::learner_context(&context);

        let routing = document_routing(message);
        let documents = if routing.searches() {
            match self.rag.context_for_query(user_id, message, DEFAULT_TOP_K).await {
                Ok(found) => found.filter(|c| routing.accepts(c)),
                Err(err) => {
                    warn!(%user_id, error = %err, "document lookup failed");
                    None
                }
            }
        } else {
            None
        };

        let prompt = match documents {
            Some(documents) => {
                debug!(%user_id, ?routing, "answering from documents");
                prompts::document_answer(&base, &documents, message)
            }
            None => {
                let intent = detect_intent(message);
                debug!(%user_id, ?intent, ?routing, "answering from progress context");
                prompts::tutor_reply(&base, intent, message, &transcript(history))
            }
        };
        Ok(complete_or(self.model.as_ref(), CompletionRequest::new(prompt), prompts::CHAT_FALLBACK).await)
    }

    /// Store the learner's message, ask the tutor and store its reply.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Validation` for a blank or oversized message.
    pub async fn send(&self, user_id: UserId, message: &str) -> Result<ChatExchange, ChatServiceError> {
        validate::chat_message(message)?;
        let message = message.trim();
        let mut session = self.get_or_create_session(user_id).await?;
        let history = self.chats.recent_messages(session.id, HISTORY_TURNS).await?;

        let user_message = self.add_message(&mut session, Role::User, message).await?;
        let reply_text = self.generate_reply(user_id, message, &history).await?;
        let reply = self.add_message(&mut session, Role::Ai, reply_text).await?;
        info!(%user_id, session_id = %session.id, messages = session.message_count, "chat turn");
        Ok(ChatExchange {
            session_id: session.id,
            user_message,
            reply,
        })
    }

    /// Opening line for today's session, stored as the tutor's first message
    /// when the open session has none yet.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on backend failures.
    pub async fn daily_greeting(&self, user_id: UserId) -> Result<String, ChatServiceError> {
        let context = self.user_context(user_id).await?;
        let fallback = format!(
            "Welcome back! Ready for Day {} of your learning journey?",
            context.current_day
        );
        let request = CompletionRequest::new(prompts::daily_greeting(&context)).max_tokens(GREETING_TOKENS);
        let greeting = complete_or(self.model.as_ref(), request, &fallback).await;

        let mut session = self.get_or_create_session(user_id).await?;
        if session.message_count == 0 {
            self.add_message(&mut session, Role::Ai, greeting.as_str()).await?;
            debug!(%user_id, session_id = %session.id, "greeting opened the session");
        }
        Ok(greeting)
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

fn transcript(history: &[ChatMessage]) -> String {
    let mut out = String::new();
    for message in history {
        let _ = writeln!(out, "{}: {}", message.role.as_str(), message.content);
    }
    out
}
