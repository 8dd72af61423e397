//! Registration, login, the learner's own record and settings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use services::{LoginSession, PreferenceUpdate, Registration};
use study_core::model::{StudentProfile, User};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::Message;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/me", get(me).patch(update_me))
        .route("/me/password", post(change_password))
        .route("/settings/preferences", patch(update_preferences))
        .route("/settings/reset-progress", post(reset_progress))
        .route("/settings/delete-data", post(delete_all_data))
        .route("/settings/account", delete(delete_account))
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.services.auth().register(form).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    /// Username or email.
    login: String,
    password: String,
}

async fn login(State(state): State<AppState>, Json(form): Json<LoginForm>) -> ApiResult<Json<LoginSession>> {
    let session = state.services.auth().login(&form.login, &form.password).await?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
struct Me {
    user: User,
    profile: StudentProfile,
}

async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Me>> {
    let profile = state.services.auth().profile(user.id()).await?;
    Ok(Json(Me {
        user: user.0,
        profile,
    }))
}

#[derive(Debug, Deserialize)]
struct NameUpdate {
    full_name: String,
}

async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<NameUpdate>,
) -> ApiResult<Json<User>> {
    let user = state
        .services
        .auth()
        .update_full_name(user.id(), &update.full_name)
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct PasswordChange {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(change): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    state
        .services
        .auth()
        .change_password(user.id(), &change.current_password, &change.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<PreferenceUpdate>,
) -> ApiResult<Json<StudentProfile>> {
    let profile = state
        .services
        .settings()
        .update_preferences(user.id(), update)
        .await?;
    Ok(Json(profile))
}

async fn reset_progress(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    state.services.settings().reset_progress(user.id()).await?;
    Ok(Message::json("Progress reset. You are back on Day 1."))
}

async fn delete_all_data(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    state.services.settings().delete_all_data(user.id()).await?;
    Ok(Message::json("All study data deleted. Complete onboarding to start again."))
}

async fn delete_account(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    state.services.settings().delete_account(user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
