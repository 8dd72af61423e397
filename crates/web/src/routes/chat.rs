use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use services::{ChatExchange, SessionPreview};
use study_core::model::{ChatMessage, ChatSession, SessionId};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::Message;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/session", get(current_session))
        .route("/chat/sessions", get(list_sessions))
        .route("/chat/sessions/:session_id/end", post(end_session))
        .route("/chat/sessions/:session_id/messages", get(history))
        .route("/chat/messages", post(send))
        .route("/chat/greeting", get(greeting))
}

async fn current_session(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ChatSession>> {
    Ok(Json(state.services.chat().get_or_create_session(user.id()).await?))
}

async fn list_sessions(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<SessionPreview>>> {
    Ok(Json(state.services.chat().list_sessions(user.id()).await?))
}

async fn end_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<ChatSession>> {
    Ok(Json(state.services.chat().end_session(user.id(), session_id).await?))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<SessionId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = state
        .services
        .chat()
        .history(user.id(), session_id, query.limit)
        .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
struct Outgoing {
    message: String,
}

async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    Json(outgoing): Json<Outgoing>,
) -> ApiResult<Json<ChatExchange>> {
    Ok(Json(state.services.chat().send(user.id(), &outgoing.message).await?))
}

async fn greeting(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    Ok(Message::json(state.services.chat().daily_greeting(user.id()).await?))
}
