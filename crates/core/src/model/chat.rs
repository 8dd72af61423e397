use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MessageId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ai => "ai",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "ai" => Some(Role::Ai),
            _ => None,
        }
    }
}

/// Progress snapshot attached to a chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub current_day: u32,
    pub current_topic: Option<String>,
    pub last_interaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: u32,
    pub context: SessionContext,
}

impl ChatSession {
    #[must_use]
    pub fn open(user_id: UserId, context: SessionContext, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            started_at: now,
            ended_at: None,
            message_count: 0,
            context,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::generate(),
            session_id,
            role,
            content: content.into(),
            timestamp: now,
            message_type: "text".to_string(),
        }
    }
}
