use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use services::prompts::CHAT_FALLBACK;
use services::{AppServices, Clock, HashingEmbeddingProvider, OpenAiCompatibleClient, ServicesConfig};
use storage::repository::Storage;
use study_core::time::fixed_now;
use web::AppState;

fn test_app(upload_dir: &Path) -> Router {
    let services = AppServices::from_storage(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        Arc::new(OpenAiCompatibleClient::new(None)),
        Arc::new(HashingEmbeddingProvider::new(64)),
        &ServicesConfig::new("web-test-secret", upload_dir),
    );
    web::app(AppState::new(services))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

async fn signed_in(app: &Router) -> String {
    let (status, _) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ada_l",
            "email": "ada@example.com",
            "password": "analytical",
            "full_name": "Ada Lovelace"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "login": "ada_l", "password": "analytical" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn multipart(filename: &str, contents: &str) -> Request<Body> {
    let boundary = "study-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"topic\"\r\n\r\n\
         Python\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         {contents}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method(Method::POST)
        .uri("/api/documents")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn accounts_are_unique_and_protected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = signed_in(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ada_l",
            "email": "other@example.com",
            "password": "analytical",
            "full_name": "Ada Again"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username or email already exists");

    let (status, _) = call(&app, Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/api/me", Some("forged.token.value"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ada_l");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["profile"]["onboarding_completed"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "login": "ada_l", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username/email or password");

    let (status, _) = call(&app, Method::DELETE, "/api/settings/account", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn onboarded_learner_works_through_the_day() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = signed_in(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/onboarding",
        Some(&token),
        Some(json!({ "topics": ["Python"], "hours_per_day": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["days"], 8);
    assert_eq!(body["profile"]["current_day"], 1);

    let (status, body) = call(&app, Method::GET, "/api/progress/today", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rollover"]["changed"], false);
    assert_eq!(body["summary"]["day_number"], 1);
    assert_eq!(body["summary"]["total_tasks"], 3);

    let (status, body) = call(&app, Method::POST, "/api/progress/complete-day", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please complete all tasks (0/3 done)");

    let (_, today) = call(&app, Method::GET, "/api/plan/today", Some(&token), None).await;
    let plan_id = today["id"].as_str().unwrap().to_string();
    for index in 0..3 {
        let uri = format!("/api/plan/{plan_id}/tasks/{index}/complete");
        let (status, _) = call(&app, Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&app, Method::POST, "/api/progress/complete-day", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().starts_with("Day 1 completed!"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/chat/messages",
        Some(&token),
        Some(json!({ "message": "What should I revise?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["content"], CHAT_FALLBACK);

    let (status, body) = call(&app, Method::GET, "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["message_count"], 2);
    assert_eq!(body[0]["preview"], "What should I revise?");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/quizzes",
        Some(&token),
        Some(json!({ "topic": "Python", "kind": "mcq" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let missing = "/api/quizzes/00000000-0000-4000-8000-000000000000";
    let (status, _) = call(&app, Method::GET, missing, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/api/progress/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_day"], 2);
    assert_eq!(body["completed_days"], 1);
}

#[tokio::test]
async fn unreadable_uploads_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());
    let token = signed_in(&app).await;

    let mut request = multipart("notes.txt", "plain text");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("PDF"));

    let mut request = multipart("broken.pdf", "not really a pdf");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Failed to extract text from PDF. File might be empty or corrupted."
    );

    let (status, body) = call(&app, Method::GET, "/api/documents", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
