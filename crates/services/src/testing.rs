//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use storage::repository::Storage;
use study_core::model::{NewUser, StudentProfile, User, UserId};
use study_core::time::fixed_now;

use crate::ai::{CompletionRequest, LanguageModel};
use crate::error::LlmError;

/// Replies with queued answers in order, then fails as disabled.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(LlmError::EmptyResponse)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::Disabled))
    }
}

/// In-memory storage with one registered learner studying `topics`.
pub async fn learner(topics: &[&str]) -> (Storage, User) {
    let storage = Storage::in_memory();
    let user = NewUser {
        username: "learner".into(),
        email: "learner@example.com".into(),
        password_hash: "hash".into(),
        full_name: "Test Learner".into(),
        age_group: None,
    }
    .into_user(UserId::generate(), fixed_now());
    let mut profile = StudentProfile::new(user.id, fixed_now());
    profile.topics = topics.iter().map(|t| (*t).to_string()).collect();
    storage.users.create_user(&user, &profile).await.unwrap();
    (storage, user)
}
