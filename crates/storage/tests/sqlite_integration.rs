use chrono::Duration;
use study_core::curriculum::{PlanRequest, generate_plan};
use study_core::model::{
    ChatMessage, ChatSession, DailyAnalytics, DayStatus, McqQuestion, NewUser, Question,
    QuestionFeedback, Quiz, QuizKind, QuizResponse, QuizStatus, Resource, ResourceChunk,
    ResourceId, Role, SessionContext, StudentProfile, User, UserId,
};
use study_core::time::fixed_now;
use storage::repository::{
    AnalyticsRepository, ChatRepository, PlanRepository, ProfileRepository, QuizRepository,
    ResourceRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn registered(repo: &SqliteRepository, name: &str) -> User {
    let user = NewUser {
        username: name.into(),
        email: format!("{name}@example.com"),
        password_hash: "hash".into(),
        full_name: "Test User".into(),
        age_group: Some("18-25".into()),
    }
    .into_user(UserId::generate(), fixed_now());
    repo.create_user(&user, &StudentProfile::new(user.id, fixed_now()))
        .await
        .expect("create user");
    user
}

fn mcq_quiz(user_id: UserId, day: Option<u32>) -> Quiz {
    let question = Question::Mcq(McqQuestion {
        question: "What does `let` do?".into(),
        options: vec!["A) binds".into(), "B) loops".into()],
        correct_answer: "A".into(),
        explanation: "It introduces a binding.".into(),
    });
    Quiz::new(user_id, "Rust", QuizKind::Mcq, day, vec![question], fixed_now())
}

#[tokio::test]
async fn users_are_unique_and_found_by_login() {
    let repo = repo("memdb_users").await;
    let ada = registered(&repo, "ada").await;

    let by_name = repo.find_by_login("ada").await.unwrap().expect("by username");
    assert_eq!(by_name.id, ada.id);
    let by_email = repo.find_by_login("ada@example.com").await.unwrap().expect("by email");
    assert_eq!(by_email.id, ada.id);
    assert!(repo.find_by_login("nobody").await.unwrap().is_none());

    assert!(repo.login_taken("ada", "other@example.com").await.unwrap());
    assert!(repo.login_taken("other", "ADA@example.com").await.unwrap());
    assert!(!repo.login_taken("grace", "grace@example.com").await.unwrap());

    let twin = NewUser {
        username: "ada".into(),
        email: "twin@example.com".into(),
        password_hash: "hash".into(),
        full_name: "Twin".into(),
        age_group: None,
    }
    .into_user(UserId::generate(), fixed_now());
    let err = repo
        .create_user(&twin, &StudentProfile::new(twin.id, fixed_now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    let profile = repo.get_profile(ada.id).await.unwrap();
    assert_eq!(profile.current_day, 1);
    assert!(!profile.onboarding_completed);
}

#[tokio::test]
async fn plan_and_progress_persist_together() {
    let repo = repo("memdb_plan").await;
    let user = registered(&repo, "learner").await;
    let topics = vec!["Python".to_string()];
    let today = fixed_now().date_naive();
    let plan = generate_plan(&PlanRequest {
        user_id: user.id,
        topics: &topics,
        total_days: 5,
        start_date: today,
        hours_per_day: 3,
    })
    .unwrap();
    repo.replace_plan(user.id, &plan.days).await.unwrap();

    let stored = repo.list_plan(user.id).await.unwrap();
    assert_eq!(stored.len(), 5);
    assert!(stored.windows(2).all(|w| w[0].day_number < w[1].day_number));
    assert_eq!(stored[0], plan.days[0]);

    let mut day_one = repo.find_day(user.id, 1).await.unwrap().expect("day one");
    for index in 0..day_one.tasks.len() {
        day_one.complete_task(index, fixed_now()).unwrap();
    }
    let mut profile = repo.get_profile(user.id).await.unwrap();
    profile.current_day = 2;
    profile.streak = 1;
    let mut analytics = DailyAnalytics::empty(user.id, today);
    analytics.tasks_completed = u32::try_from(day_one.tasks.len()).unwrap();
    analytics.streak_maintained = true;

    repo.save_progress(&profile, std::slice::from_ref(&day_one), Some(&analytics))
        .await
        .unwrap();

    let reloaded = repo.get_day(day_one.id).await.unwrap();
    assert_eq!(reloaded.status, DayStatus::Completed);
    assert!(reloaded.all_tasks_done());
    assert_eq!(repo.get_profile(user.id).await.unwrap().current_day, 2);

    // Recording the same date twice replaces the row.
    analytics.hours_studied = 2.5;
    repo.record_day(&analytics).await.unwrap();
    let rows = repo
        .list_range(user.id, today - Duration::days(7), today)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!((rows[0].hours_studied - 2.5).abs() < f64::EPSILON);

    // A new plan replaces the old one wholesale.
    repo.replace_plan(user.id, &plan.days[..2]).await.unwrap();
    assert_eq!(repo.list_plan(user.id).await.unwrap().len(), 2);
    assert!(repo.find_day(user.id, 5).await.unwrap().is_none());
}

#[tokio::test]
async fn regenerated_plan_and_profile_commit_or_roll_back_together() {
    let repo = repo("memdb_regenerate").await;
    let user = registered(&repo, "planner").await;
    let topics = vec!["Python".to_string()];
    let plan = generate_plan(&PlanRequest {
        user_id: user.id,
        topics: &topics,
        total_days: 4,
        start_date: fixed_now().date_naive(),
        hours_per_day: 2,
    })
    .unwrap();

    let mut profile = repo.get_profile(user.id).await.unwrap();
    profile.topics.clone_from(&topics);
    profile.current_day = 1;
    profile.study_start_date = Some(fixed_now().date_naive());
    repo.save_with_plan(&profile, &plan.days).await.unwrap();
    assert_eq!(repo.list_plan(user.id).await.unwrap().len(), 4);
    assert_eq!(repo.get_profile(user.id).await.unwrap().topics, topics);

    // A duplicate row fails the insert after the profile write; neither sticks.
    profile.current_day = 3;
    let broken = vec![plan.days[0].clone(), plan.days[0].clone()];
    assert!(repo.save_with_plan(&profile, &broken).await.is_err());
    assert_eq!(repo.get_profile(user.id).await.unwrap().current_day, 1);
    assert_eq!(repo.list_plan(user.id).await.unwrap(), plan.days);
}

#[tokio::test]
async fn quizzes_store_responses_and_order_by_attempt() {
    let repo = repo("memdb_quiz").await;
    let user = registered(&repo, "quizzer").await;

    let mut first = mcq_quiz(user.id, Some(1));
    let mut second = mcq_quiz(user.id, None);
    let pending = mcq_quiz(user.id, Some(1));
    for quiz in [&first, &second, &pending] {
        repo.insert_quiz(quiz).await.unwrap();
    }
    assert_eq!(repo.get_quiz(first.id).await.unwrap().questions, first.questions);

    first.score = Some(10);
    first.status = QuizStatus::Completed;
    first.attempted_at = Some(fixed_now());
    let response = QuizResponse {
        quiz_id: first.id,
        graded: QuestionFeedback {
            question_number: 1,
            question: "What does `let` do?".into(),
            student_answer: "A".into(),
            correct_answer: Some("A".into()),
            is_correct: true,
            points: 10,
            feedback: "Correct!".into(),
            explanation: None,
        },
    };
    repo.complete_quiz(&first, std::slice::from_ref(&response)).await.unwrap();

    second.score = Some(0);
    second.status = QuizStatus::Completed;
    second.attempted_at = Some(fixed_now() + Duration::minutes(5));
    repo.complete_quiz(&second, &[]).await.unwrap();

    let completed = repo.list_completed(user.id, None).await.unwrap();
    assert_eq!(
        completed.iter().map(|q| q.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(repo.list_completed(user.id, Some(1)).await.unwrap().len(), 1);

    let day_one = repo.list_for_day(user.id, 1).await.unwrap();
    assert_eq!(day_one.len(), 1);
    assert_eq!(day_one[0].id, first.id);

    assert_eq!(repo.list_responses(first.id).await.unwrap(), vec![response]);

    let ghost = mcq_quiz(user.id, None);
    assert!(matches!(
        repo.complete_quiz(&ghost, &[]).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn chat_messages_keep_insertion_order() {
    let repo = repo("memdb_chat").await;
    let user = registered(&repo, "chatter").await;

    let mut session = ChatSession::open(user.id, SessionContext::default(), fixed_now());
    repo.insert_session(&session).await.unwrap();
    assert_eq!(
        repo.open_session(user.id).await.unwrap().map(|s| s.id),
        Some(session.id)
    );

    for (i, text) in ["hi", "what is ownership?", "thanks"].iter().enumerate() {
        session.message_count += 1;
        let role = if i % 2 == 0 { Role::User } else { Role::Ai };
        let message = ChatMessage::new(session.id, role, *text, fixed_now());
        repo.append_message(&session, &message).await.unwrap();
    }

    let recent = repo.recent_messages(session.id, 2).await.unwrap();
    assert_eq!(
        recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
        vec!["what is ownership?", "thanks"]
    );
    let first = repo.first_message(session.id).await.unwrap().expect("first");
    assert_eq!(first.content, "hi");
    assert_eq!(repo.get_session(session.id).await.unwrap().message_count, 3);

    session.ended_at = Some(fixed_now());
    repo.update_session(&session).await.unwrap();
    assert!(repo.open_session(user.id).await.unwrap().is_none());
    assert_eq!(repo.list_sessions(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn resources_keep_chunk_embeddings() {
    let repo = repo("memdb_resources").await;
    let user = registered(&repo, "reader").await;

    let resource = Resource {
        id: ResourceId::generate(),
        user_id: user.id,
        filename: "notes.txt".into(),
        file_path: "uploads/notes.txt".into(),
        file_type: "txt".into(),
        topic: Some("Rust".into()),
        extracted_text: "borrowing rules".into(),
        processed: true,
        embeddings_generated: false,
        uploaded_at: fixed_now(),
    };
    repo.insert_resource(&resource).await.unwrap();

    let chunks = vec![
        ResourceChunk {
            resource_id: resource.id,
            ordinal: 0,
            text: "borrowing".into(),
            embedding: vec![0.5, -0.25],
        },
        ResourceChunk {
            resource_id: resource.id,
            ordinal: 1,
            text: "rules".into(),
            embedding: vec![1.0, 0.0],
        },
    ];
    repo.store_chunks(resource.id, &chunks).await.unwrap();

    assert!(repo.get_resource(resource.id).await.unwrap().embeddings_generated);
    assert_eq!(repo.list_chunks(resource.id).await.unwrap(), chunks);

    repo.delete_resource(resource.id).await.unwrap();
    assert!(repo.list_chunks(resource.id).await.unwrap().is_empty());
    assert!(matches!(
        repo.get_resource(resource.id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn clearing_user_data_keeps_the_account() {
    let repo = repo("memdb_clear").await;
    let user = registered(&repo, "resetter").await;
    repo.insert_quiz(&mcq_quiz(user.id, None)).await.unwrap();
    let session = ChatSession::open(user.id, SessionContext::default(), fixed_now());
    repo.insert_session(&session).await.unwrap();

    repo.clear_user_data(user.id).await.unwrap();
    assert!(repo.list_sessions(user.id).await.unwrap().is_empty());
    assert!(repo.get_user(user.id).await.is_ok());

    repo.delete_user(user.id).await.unwrap();
    assert!(matches!(repo.get_user(user.id).await, Err(StorageError::NotFound)));
    assert!(matches!(repo.get_profile(user.id).await, Err(StorageError::NotFound)));
}
