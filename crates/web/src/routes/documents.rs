//! PDF uploads, keyword search inside a document and semantic search across them.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use services::{Upload, UploadOutcome};
use study_core::model::{Resource, ResourceId};
use study_core::retrieval::{DEFAULT_TOP_K, KeywordMatch, SearchHit};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Largest accepted upload plus room for the multipart framing.
const UPLOAD_BODY_LIMIT: usize = 51 * 1024 * 1024;
const MAX_TOP_K: usize = 10;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            get(list).post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/documents/search", get(semantic_search))
        .route("/documents/:resource_id", get(detail).delete(remove))
        .route("/documents/:resource_id/search", get(keyword_search))
        .route("/documents/:resource_id/embeddings", post(embed))
}

/// Reads the `file` part and the optional `topic` part.
async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut file = None;
    let mut topic = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("topic") => topic = Some(field.text().await?),
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }
    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    Ok(Upload {
        filename,
        bytes,
        topic,
    })
}

async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadOutcome>)> {
    let upload = read_upload(multipart).await?;
    let outcome = state.services.documents().upload(user.id(), upload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Resource>>> {
    Ok(Json(state.services.documents().list(user.id()).await?))
}

async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<ResourceId>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.services.documents().get(user.id(), resource_id).await?))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<ResourceId>,
) -> ApiResult<StatusCode> {
    state.services.documents().delete(user.id(), resource_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    top_k: Option<usize>,
}

async fn keyword_search(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<ResourceId>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<KeywordMatch>>> {
    let matches = state
        .services
        .documents()
        .keyword_search(user.id(), resource_id, &query.q)
        .await?;
    Ok(Json(matches))
}

async fn semantic_search(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let top_k = query.top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K);
    Ok(Json(state.services.rag().search(user.id(), &query.q, top_k).await?))
}

#[derive(Debug, Serialize)]
struct Embedded {
    resource_id: ResourceId,
    chunks: usize,
}

async fn embed(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<ResourceId>,
) -> ApiResult<Json<Embedded>> {
    state.services.documents().get(user.id(), resource_id).await?;
    let chunks = state.services.rag().generate_embeddings(resource_id).await?;
    Ok(Json(Embedded { resource_id, chunks }))
}
