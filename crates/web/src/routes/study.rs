//! Onboarding, the study plan and day-to-day progress.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use services::{OnboardingOutcome, PlanOutcome, StudyStats};
use study_core::model::{OnboardingChoices, PlanId, StudyDay};
use study_core::progress::{Achievement, Rollover, TodaySummary, WeekSummary};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::Message;
use crate::state::AppState;

const DEFAULT_UPCOMING: usize = 3;
const MAX_UPCOMING: usize = 30;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/onboarding", post(save_onboarding))
        .route("/onboarding/greeting", get(onboarding_greeting))
        .route("/onboarding/summary", get(onboarding_summary))
        .route("/plan", get(list_plan))
        .route("/plan/generate", post(generate_plan))
        .route("/plan/today", get(today_plan))
        .route("/plan/upcoming", get(upcoming))
        .route("/plan/:plan_id/tasks/:index/complete", post(complete_task))
        .route("/progress/today", get(today))
        .route("/progress/complete-day", post(complete_day))
        .route("/progress/advance", post(force_advance))
        .route("/progress/reset", post(reset_to_day_one))
        .route("/progress/week", get(week))
        .route("/progress/stats", get(stats))
        .route("/progress/achievements", get(achievements))
}

//
// ─── ONBOARDING ────────────────────────────────────────────────────────────────
//

async fn save_onboarding(
    State(state): State<AppState>,
    user: AuthUser,
    Json(choices): Json<OnboardingChoices>,
) -> ApiResult<Json<OnboardingOutcome>> {
    let outcome = state.services.onboarding().save(user.id(), choices).await?;
    Ok(Json(outcome))
}

async fn onboarding_greeting(State(state): State<AppState>, _user: AuthUser) -> Json<Message> {
    Message::json(state.services.onboarding().greeting().await)
}

async fn onboarding_summary(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    let summary = state.services.onboarding().summary(user.id()).await?;
    Ok(Message::json(summary))
}

//
// ─── PLAN ──────────────────────────────────────────────────────────────────────
//

async fn list_plan(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<StudyDay>>> {
    Ok(Json(state.services.plans().list_plan(user.id()).await?))
}

async fn generate_plan(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<PlanOutcome>> {
    Ok(Json(state.services.plans().generate_full_plan(user.id()).await?))
}

async fn today_plan(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Option<StudyDay>>> {
    Ok(Json(state.services.plans().today_plan(user.id()).await?))
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    count: Option<usize>,
}

async fn upcoming(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<StudyDay>>> {
    let count = query.count.unwrap_or(DEFAULT_UPCOMING).min(MAX_UPCOMING);
    Ok(Json(state.services.plans().upcoming(user.id(), count).await?))
}

async fn complete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path((plan_id, index)): Path<(PlanId, usize)>,
) -> ApiResult<Json<StudyDay>> {
    let day = state
        .services
        .plans()
        .complete_task(user.id(), plan_id, index)
        .await?;
    Ok(Json(day))
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Dashboard payload: the rollover check result and today's summary.
#[derive(Debug, Serialize)]
struct Today {
    rollover: Rollover,
    summary: TodaySummary,
}

async fn today(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Today>> {
    let progress = state.services.progress();
    let rollover = progress.check_and_update_day(user.id()).await?;
    let summary = progress.today_summary(user.id()).await?;
    Ok(Json(Today { rollover, summary }))
}

async fn complete_day(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    let message = state.services.progress().mark_day_complete(user.id()).await?;
    Ok(Message::json(message))
}

async fn force_advance(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    let message = state.services.progress().force_advance(user.id()).await?;
    Ok(Message::json(message))
}

async fn reset_to_day_one(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    state.services.progress().reset_to_day_one(user.id()).await?;
    Ok(Message::json("Back to Day 1"))
}

async fn week(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Option<WeekSummary>>> {
    Ok(Json(state.services.progress().week_summary(user.id()).await?))
}

async fn stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<StudyStats>> {
    Ok(Json(state.services.progress().stats(user.id()).await?))
}

async fn achievements(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Achievement>>> {
    Ok(Json(state.services.progress().achievements(user.id()).await?))
}
