use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::info;

use storage::repository::{ProfileRepository, StorageError, UserRepository};
use study_core::model::{NewUser, StudentProfile, User, UserId};
use study_core::validate;

use crate::Clock;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

/// Fields submitted on sign-up.
#[derive(Clone, Debug, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub age_group: Option<String>,
}

/// A successful login: the bearer token and who it belongs to.
#[derive(Clone, Debug, Serialize)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Issues and checks `user_id.expiry.signature` bearer tokens.
///
/// The signature is HMAC-SHA256 over `user_id.expiry`, base64url encoded.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the signing key is unusable.
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), AuthError> {
        let expires_at = now + self.ttl;
        let payload = format!("{user_id}.{}", expires_at.timestamp());
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok((format!("{payload}.{signature}"), expires_at))
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed or forged tokens and
    /// `AuthError::TokenExpired` once the expiry has passed.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (user_id, expiry) = payload.split_once('.').ok_or(AuthError::InvalidToken)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let expiry: i64 = expiry.parse().map_err(|_| AuthError::InvalidToken)?;
        if now.timestamp() >= expiry {
            return Err(AuthError::TokenExpired);
        }
        user_id.parse().map_err(|_| AuthError::InvalidToken)
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Accounts, credentials and bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    tokens: TokenSigner,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        tokens: TokenSigner,
    ) -> Self {
        Self {
            clock,
            users,
            profiles,
            tokens,
        }
    }

    /// Create an account and its empty profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for bad input, `AuthError::Taken` when
    /// the username or email is in use, and `AuthError::Storage` otherwise.
    pub async fn register(&self, form: Registration) -> Result<User, AuthError> {
        let username = form.username.trim().to_string();
        let email = form.email.trim().to_lowercase();
        let full_name = form.full_name.trim().to_string();
        validate::username(&username)?;
        validate::email(&email)?;
        validate::password(&form.password)?;
        validate::full_name(&full_name)?;

        if self.users.login_taken(&username, &email).await? {
            return Err(AuthError::Taken);
        }

        let now = self.clock.now();
        let user = NewUser {
            username,
            email,
            password_hash: hash_password(&form.password)?,
            full_name,
            age_group: form.age_group.filter(|a| !a.trim().is_empty()),
        }
        .into_user(UserId::generate(), now);
        let profile = StudentProfile::new(user.id, now);

        match self.users.create_user(&user, &profile).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Err(AuthError::Taken),
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    /// Log in by username or email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown login or wrong
    /// password and `AuthError::Inactive` for a deactivated account.
    pub async fn login(&self, login: &str, password: &str) -> Result<LoginSession, AuthError> {
        let login = login.trim();
        let mut user = self
            .users
            .find_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        let now = self.clock.now();
        user.last_login = Some(now);
        self.users.update_user(&user).await?;

        let (token, expires_at) = self.tokens.issue(user.id, now)?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginSession {
            token,
            expires_at,
            user,
        })
    }

    /// Resolve a bearer token to an active user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken`/`TokenExpired` for bad tokens and
    /// `AuthError::Inactive` if the account was deactivated since.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.tokens.verify(token, self.clock.now())?;
        let user = match self.users.get_user(user_id).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the user does not exist.
    pub async fn user(&self, user_id: UserId) -> Result<User, AuthError> {
        Ok(self.users.get_user(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the profile does not exist.
    pub async fn profile(&self, user_id: UserId) -> Result<StudentProfile, AuthError> {
        Ok(self.profiles.get_profile(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AuthError::WrongPassword` if `current` does not match and
    /// `AuthError::Validation` if `new_password` is unacceptable.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.users.get_user(user_id).await?;
        if !verify_password(current, &user.password_hash) {
            return Err(AuthError::WrongPassword);
        }
        validate::password(new_password)?;
        user.password_hash = hash_password(new_password)?;
        self.users.update_user(&user).await?;
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuthError::Validation` for an unacceptable name.
    pub async fn update_full_name(&self, user_id: UserId, full_name: &str) -> Result<User, AuthError> {
        let full_name = full_name.trim();
        validate::full_name(full_name)?;
        let mut user = self.users.get_user(user_id).await?;
        user.full_name = full_name.to_string();
        self.users.update_user(&user).await?;
        Ok(user)
    }
}
