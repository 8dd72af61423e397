use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use services::{QuizDetail, QuizRequest, SubmissionResult};
use study_core::model::{Answers, Quiz, QuizId};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/quizzes", get(history).post(generate))
        .route("/quizzes/:quiz_id", get(detail))
        .route("/quizzes/:quiz_id/submit", post(submit))
}

async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<QuizRequest>,
) -> ApiResult<(StatusCode, Json<Quiz>)> {
    let quiz = state.services.quizzes().generate(user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Quiz>>> {
    Ok(Json(state.services.quizzes().history(user.id(), query.limit).await?))
}

async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<Json<QuizDetail>> {
    Ok(Json(state.services.quizzes().detail(user.id(), quiz_id).await?))
}

/// Answers keyed by zero-based question index.
#[derive(Debug, Deserialize)]
struct Submission {
    answers: Answers,
    #[serde(default)]
    time_taken_secs: Option<u32>,
}

async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(quiz_id): Path<QuizId>,
    Json(submission): Json<Submission>,
) -> ApiResult<Json<SubmissionResult>> {
    let result = state
        .services
        .quizzes()
        .submit(user.id(), quiz_id, &submission.answers, submission.time_taken_secs)
        .await?;
    Ok(Json(result))
}
