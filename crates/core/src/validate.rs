//! Input checks for user-supplied fields.
//!
//! Each check returns a [`ValidationError`] whose message is safe to show to
//! the learner as-is.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MAX_TOPICS: usize = 10;
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_CHAT_MESSAGE_CHARS: usize = 5000;
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["pdf"];

const SQLISH_TOKENS: &[&str] = &[
    "'", "\"", ";", "--", "/*", "*/", "xp_", "sp_", "exec", "execute", "select", "insert",
    "update", "delete", "drop",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn invalid<T>(message: impl Into<String>) -> Result<T, ValidationError> {
    Err(ValidationError::new(message))
}

fn username_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid username regex"));
    &PATTERN
}

fn email_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    });
    &PATTERN
}

/// # Errors
///
/// Returns `ValidationError` when the username is too short or long, has
/// characters outside `[A-Za-z0-9_-]`, or contains an SQL-like token.
pub fn username(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < 3 {
        return invalid("Username must be at least 3 characters");
    }
    if len > 50 {
        return invalid("Username must be less than 50 characters");
    }
    if !username_pattern().is_match(value) {
        return invalid("Username can only contain letters, numbers, _ and -");
    }
    let lower = value.to_lowercase();
    if SQLISH_TOKENS.iter().any(|t| lower.contains(t)) {
        return invalid("Invalid characters in username");
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` for empty, overlong or malformed addresses.
pub fn email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return invalid("Email is required");
    }
    if value.len() > 255 {
        return invalid("Email too long");
    }
    if !email_pattern().is_match(value) {
        return invalid("Invalid email format");
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` when the password is under 6 or over 128 chars.
pub fn password(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < 6 {
        return invalid("Password must be at least 6 characters");
    }
    if len > 128 {
        return invalid("Password too long");
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` unless the name is 2..=100 letters and spaces.
pub fn full_name(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < 2 {
        return invalid("Name must be at least 2 characters");
    }
    if len > 100 {
        return invalid("Name too long");
    }
    if !value.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
        return invalid("Name can only contain letters and spaces");
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` for a date in the past or more than two years out.
pub fn target_date(value: Option<NaiveDate>, today: NaiveDate) -> Result<(), ValidationError> {
    let Some(target) = value else {
        return Ok(());
    };
    if target < today {
        return invalid("Target date must be in the future");
    }
    if target > today + Duration::days(365 * 2) {
        return invalid("Target date too far in future (max 2 years)");
    }
    Ok(())
}

/// Returns a warning for very long days.
///
/// # Errors
///
/// Returns `ValidationError` for zero hours or more than 16.
pub fn hours_per_day(hours: u32) -> Result<Option<&'static str>, ValidationError> {
    if hours == 0 {
        return invalid("Study hours must be greater than 0");
    }
    if hours > 16 {
        return invalid("Study hours cannot exceed 16 hours per day");
    }
    if hours > 12 {
        return Ok(Some("12+ hours/day is very intensive"));
    }
    Ok(None)
}

/// # Errors
///
/// Returns `ValidationError` unless 1..=10 topics are given.
pub fn topics(values: &[String]) -> Result<(), ValidationError> {
    if values.is_empty() {
        return invalid("Please select at least one topic");
    }
    if values.len() > MAX_TOPICS {
        return invalid(format!("Maximum {MAX_TOPICS} topics allowed"));
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` for a disallowed extension, an empty file or one
/// over the size limit.
pub fn upload(filename: &str, size_bytes: u64) -> Result<(), ValidationError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        let allowed = ALLOWED_UPLOAD_EXTENSIONS.join(", ").to_uppercase();
        return invalid(format!("Only {allowed} files allowed"));
    }
    if size_bytes == 0 {
        return invalid("File is empty");
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        #[allow(clippy::cast_precision_loss)]
        let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
        return invalid(format!("File too large (max 50MB, your file: {size_mb:.1}MB)"));
    }
    Ok(())
}

/// # Errors
///
/// Returns `ValidationError` for a blank message or one over 5000 chars.
pub fn chat_message(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return invalid("Message cannot be empty");
    }
    if value.chars().count() > MAX_CHAT_MESSAGE_CHARS {
        return invalid(format!(
            "Message too long (max {MAX_CHAT_MESSAGE_CHARS} characters)"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(username("ada_l-1").is_ok());
        assert_eq!(
            username("ab").unwrap_err().message(),
            "Username must be at least 3 characters"
        );
        assert!(username("has space").is_err());
        assert_eq!(
            username("dropper").unwrap_err().message(),
            "Invalid characters in username"
        );
        assert!(username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn emails() {
        assert!(email("ada@example.com").is_ok());
        assert!(email("").is_err());
        assert!(email("ada@example").is_err());
        assert!(email("ada example.com").is_err());
    }

    #[test]
    fn passwords_and_names() {
        assert!(password("123456").is_ok());
        assert!(password("12345").is_err());
        assert!(password(&"x".repeat(129)).is_err());

        assert!(full_name("Ada Lovelace").is_ok());
        assert!(full_name("A").is_err());
        assert!(full_name("R2D2").is_err());
    }

    #[test]
    fn target_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert!(target_date(None, today).is_ok());
        assert!(target_date(Some(today), today).is_ok());
        assert!(target_date(NaiveDate::from_ymd_opt(2024, 1, 9), today).is_err());
        assert!(target_date(NaiveDate::from_ymd_opt(2026, 6, 1), today).is_err());
    }

    #[test]
    fn hours() {
        assert_eq!(hours_per_day(4), Ok(None));
        assert!(hours_per_day(13).unwrap().is_some());
        assert!(hours_per_day(0).is_err());
        assert!(hours_per_day(17).is_err());
    }

    #[test]
    fn topic_counts() {
        assert!(topics(&[]).is_err());
        assert!(topics(&["DBMS".to_string()]).is_ok());
        let many: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(topics(&many).is_err());
    }

    #[test]
    fn uploads() {
        assert!(upload("notes.PDF", 1024).is_ok());
        assert_eq!(
            upload("notes.txt", 10).unwrap_err().message(),
            "Only PDF files allowed"
        );
        assert_eq!(upload("notes.pdf", 0).unwrap_err().message(), "File is empty");
        assert!(upload("notes.pdf", MAX_UPLOAD_BYTES + 1).is_err());
        assert!(upload("noextension", 10).is_err());
    }

    #[test]
    fn chat_messages() {
        assert!(chat_message("what is a B-tree?").is_ok());
        assert!(chat_message("   ").is_err());
        assert!(chat_message(&"x".repeat(5001)).is_err());
    }
}
