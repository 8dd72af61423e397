use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::UserId;

/// A registered learner account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub age_group: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Registration input after validation and password hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub age_group: Option<String>,
}

impl NewUser {
    #[must_use]
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            age_group: self.age_group,
            is_active: true,
            last_login: None,
            created_at: now,
        }
    }
}

impl User {
    /// True when `login` names this account by username or email.
    #[must_use]
    pub fn matches_login(&self, login: &str) -> bool {
        self.username == login || self.email.eq_ignore_ascii_case(login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn login_matches_username_or_email() {
        let user = NewUser {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "x".into(),
            full_name: "Ada Lovelace".into(),
            age_group: None,
        }
        .into_user(UserId::generate(), fixed_now());

        assert!(user.is_active);
        assert!(user.matches_login("ada"));
        assert!(user.matches_login("ADA@example.com"));
        assert!(!user.matches_login("Ada"));
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = NewUser {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "secret-hash".into(),
            full_name: "Ada Lovelace".into(),
            age_group: Some("18-24".into()),
        }
        .into_user(UserId::generate(), fixed_now());

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("18-24"));
    }
}
