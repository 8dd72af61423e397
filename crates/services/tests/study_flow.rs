use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use services::{
    AppServices, AuthError, Clock, CompletionRequest, HashingEmbeddingProvider, LanguageModel,
    LlmError, QuizRequest, Registration, ServicesConfig,
};
use storage::repository::Storage;
use study_core::model::{Answers, Difficulty, OnboardingChoices, QuizKind};
use study_core::time::fixed_now;

struct Scripted(Mutex<VecDeque<String>>);

impl Scripted {
    fn new(replies: &[&str]) -> Self {
        Self(Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()))
    }
}

#[async_trait]
impl LanguageModel for Scripted {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        self.0.lock().unwrap().pop_front().ok_or(LlmError::Disabled)
    }
}

const QUIZ_REPLY: &str = r#"[
  {"question": "Which keyword defines a function?", "options": ["def", "fun", "fn", "func"], "correct_answer": "def", "explanation": "Python uses def."}
]"#;

fn services(storage: &Storage, upload_dir: &std::path::Path, replies: &[&str]) -> AppServices {
    AppServices::from_storage(
        storage,
        Clock::fixed(fixed_now()),
        Arc::new(Scripted::new(replies)),
        Arc::new(HashingEmbeddingProvider::new(64)),
        &ServicesConfig::new("integration-secret", upload_dir),
    )
}

fn registration() -> Registration {
    Registration {
        username: "ada_l".into(),
        email: "Ada@Example.com".into(),
        password: "analytical".into(),
        full_name: "Ada Lovelace".into(),
        age_group: None,
    }
}

#[tokio::test]
async fn learner_goes_from_sign_up_to_first_quiz_and_chat() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::in_memory();
    let app = services(&storage, dir.path(), &[QUIZ_REPLY, "Lists keep their order."]);

    let user = app.auth().register(registration()).await.unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert!(matches!(
        app.auth().register(registration()).await,
        Err(AuthError::Taken)
    ));

    let session = app.auth().login("ada@example.com", "analytical").await.unwrap();
    let authed = app.auth().authenticate(&session.token).await.unwrap();
    assert_eq!(authed.id, user.id);

    let outcome = app
        .onboarding()
        .save(
            user.id,
            OnboardingChoices {
                topics: vec!["Python".into()],
                levels: BTreeMap::new(),
                target_date: None,
                hours_per_day: 2,
            },
        )
        .await
        .unwrap();
    assert!(outcome.profile.onboarding_completed);
    assert_eq!(outcome.plan.days, 8);

    let rollover = app.progress().check_and_update_day(user.id).await.unwrap();
    assert!(!rollover.changed);
    assert_eq!(rollover.day_number, 1);

    let today = app.plans().today_plan(user.id).await.unwrap().unwrap();
    for index in 0..today.tasks.len() {
        app.plans().complete_task(user.id, today.id, index).await.unwrap();
    }
    let message = app.progress().mark_day_complete(user.id).await.unwrap();
    assert!(message.starts_with("Day 1 completed!"));

    let quiz = app
        .quizzes()
        .generate(
            user.id,
            QuizRequest {
                topic: "Python".into(),
                kind: QuizKind::Mcq,
                difficulty: Difficulty::Easy,
                count: 1,
            },
        )
        .await
        .unwrap();
    let answers = Answers::from([(0, "def".to_string())]);
    let result = app.quizzes().submit(user.id, quiz.id, &answers, None).await.unwrap();
    assert_eq!(result.score, result.max_score);

    let exchange = app.chat().send(user.id, "  How do lists work?  ").await.unwrap();
    assert_eq!(exchange.user_message.content, "How do lists work?");
    assert_eq!(exchange.reply.content, "Lists keep their order.");
    let sessions = app.chat().list_sessions(user.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session.message_count, 2);

    let stats = app.progress().stats(user.id).await.unwrap();
    assert_eq!(stats.current_day, 2);
    assert_eq!(stats.completed_days, 1);
    assert_eq!(stats.completed_quizzes, 1);
    assert_eq!(stats.streak, 1);
}

#[tokio::test]
async fn deleting_all_data_sends_the_learner_back_to_onboarding() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::in_memory();
    let app = services(&storage, dir.path(), &[]);

    let user = app.auth().register(registration()).await.unwrap();
    app.onboarding()
        .save(
            user.id,
            OnboardingChoices {
                topics: vec!["DBMS".into()],
                levels: BTreeMap::new(),
                target_date: None,
                hours_per_day: 3,
            },
        )
        .await
        .unwrap();
    assert!(!app.plans().list_plan(user.id).await.unwrap().is_empty());

    app.settings().delete_all_data(user.id).await.unwrap();
    assert!(app.plans().list_plan(user.id).await.unwrap().is_empty());
    let profile = app.auth().profile(user.id).await.unwrap();
    assert!(!profile.onboarding_completed);

    app.settings().delete_account(user.id).await.unwrap();
    assert!(app.auth().login("ada_l", "analytical").await.is_err());
}
