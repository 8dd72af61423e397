use axum::Router;
use axum::routing::get;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

mod account;
mod chat;
mod documents;
mod quizzes;
mod study;

/// Every API route plus `/health`, without middleware.
pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(account::routes())
        .merge(study::routes())
        .merge(quizzes::routes())
        .merge(chat::routes())
        .merge(documents::routes());
    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
}

/// Body for endpoints that answer with one line of text.
#[derive(Debug, Serialize)]
pub(crate) struct Message {
    pub message: String,
}

impl Message {
    pub(crate) fn json(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
