use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::model::{
    ChatMessage, ChatSession, DailyAnalytics, DayStatus, QuestionFeedback, Quiz, QuizKind,
    QuizResponse, QuizStatus, Resource, ResourceChunk, Role, StudentProfile, StudyDay, User,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, surfacing unique-constraint violations as conflicts.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict(db.message().to_string()),
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

fn id<T: FromStr>(row: &SqliteRow, column: &str) -> Result<T, StorageError>
where
    T::Err: core::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(ser)?;
    raw.parse().map_err(ser)
}

fn u32_col(row: &SqliteRow, column: &'static str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(column).map_err(ser)?;
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {column}: {v}")))
}

fn opt_u32_col(row: &SqliteRow, column: &'static str) -> Result<Option<u32>, StorageError> {
    let v: Option<i64> = row.try_get(column).map_err(ser)?;
    v.map(|v| {
        u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {column}: {v}")))
    })
    .transpose()
}

fn bool_col(row: &SqliteRow, column: &str) -> Result<bool, StorageError> {
    let v: i64 = row.try_get(column).map_err(ser)?;
    Ok(v != 0)
}

pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn embedding_from_blob(blob: &[u8]) -> Result<Vec<f32>, StorageError> {
    if blob.len() % 4 != 0 {
        return Err(StorageError::Serialization(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

//
// ─── ROW MAPPERS ───────────────────────────────────────────────────────────────
//

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: id(row, "id")?,
        username: row.try_get("username").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        password_hash: row.try_get("password_hash").map_err(ser)?,
        full_name: row.try_get("full_name").map_err(ser)?,
        age_group: row.try_get("age_group").map_err(ser)?,
        is_active: bool_col(row, "is_active")?,
        last_login: row.try_get("last_login").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<StudentProfile, StorageError> {
    Ok(StudentProfile {
        user_id: id(row, "user_id")?,
        topics: from_json(row, "topics")?,
        levels: from_json(row, "levels")?,
        hours_per_day: u32_col(row, "hours_per_day")?,
        target_date: row.try_get("target_date").map_err(ser)?,
        study_start_date: row.try_get("study_start_date").map_err(ser)?,
        last_active_date: row.try_get("last_active_date").map_err(ser)?,
        current_day: u32_col(row, "current_day")?,
        total_planned_days: u32_col(row, "total_planned_days")?,
        days_remaining: opt_u32_col(row, "days_remaining")?,
        streak: u32_col(row, "streak")?,
        timezone: row.try_get("timezone").map_err(ser)?,
        onboarding_completed: bool_col(row, "onboarding_completed")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_day_row(row: &SqliteRow) -> Result<StudyDay, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(StudyDay {
        id: id(row, "id")?,
        user_id: id(row, "user_id")?,
        day_number: u32_col(row, "day_number")?,
        plan_date: row.try_get("plan_date").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        subtopics: from_json(row, "subtopics")?,
        tasks: from_json(row, "tasks")?,
        estimated_hours: row.try_get("estimated_hours").map_err(ser)?,
        actual_hours: row.try_get("actual_hours").map_err(ser)?,
        status: DayStatus::parse(&status)
            .ok_or_else(|| StorageError::Serialization(format!("invalid status: {status}")))?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_quiz_row(row: &SqliteRow) -> Result<Quiz, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Quiz {
        id: id(row, "id")?,
        user_id: id(row, "user_id")?,
        topic: row.try_get("topic").map_err(ser)?,
        kind: QuizKind::parse(&kind)
            .ok_or_else(|| StorageError::Serialization(format!("invalid quiz kind: {kind}")))?,
        day_number: opt_u32_col(row, "day_number")?,
        questions: from_json(row, "questions")?,
        score: opt_u32_col(row, "score")?,
        max_score: u32_col(row, "max_score")?,
        time_taken_secs: opt_u32_col(row, "time_taken_secs")?,
        status: match status.as_str() {
            "pending" => QuizStatus::Pending,
            "completed" => QuizStatus::Completed,
            other => {
                return Err(StorageError::Serialization(format!(
                    "invalid quiz status: {other}"
                )));
            }
        },
        created_at: row.try_get("created_at").map_err(ser)?,
        attempted_at: row.try_get("attempted_at").map_err(ser)?,
    })
}

pub(crate) fn map_response_row(row: &SqliteRow) -> Result<QuizResponse, StorageError> {
    Ok(QuizResponse {
        quiz_id: id(row, "quiz_id")?,
        graded: QuestionFeedback {
            question_number: u32_col(row, "question_number")?,
            question: row.try_get("question_text").map_err(ser)?,
            student_answer: row.try_get("student_answer").map_err(ser)?,
            correct_answer: row.try_get("correct_answer").map_err(ser)?,
            is_correct: bool_col(row, "is_correct")?,
            points: u32_col(row, "points")?,
            feedback: row.try_get("feedback").map_err(ser)?,
            explanation: None,
        },
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<ChatSession, StorageError> {
    Ok(ChatSession {
        id: id(row, "id")?,
        user_id: id(row, "user_id")?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        message_count: u32_col(row, "message_count")?,
        context: from_json(row, "context")?,
    })
}

pub(crate) fn map_message_row(row: &SqliteRow) -> Result<ChatMessage, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    Ok(ChatMessage {
        id: id(row, "id")?,
        session_id: id(row, "session_id")?,
        role: Role::parse(&role)
            .ok_or_else(|| StorageError::Serialization(format!("invalid role: {role}")))?,
        content: row.try_get("content").map_err(ser)?,
        timestamp: row.try_get("timestamp").map_err(ser)?,
        message_type: row.try_get("message_type").map_err(ser)?,
    })
}

pub(crate) fn map_resource_row(row: &SqliteRow) -> Result<Resource, StorageError> {
    Ok(Resource {
        id: id(row, "id")?,
        user_id: id(row, "user_id")?,
        filename: row.try_get("filename").map_err(ser)?,
        file_path: row.try_get("file_path").map_err(ser)?,
        file_type: row.try_get("file_type").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        extracted_text: row.try_get("extracted_text").map_err(ser)?,
        processed: bool_col(row, "processed")?,
        embeddings_generated: bool_col(row, "embeddings_generated")?,
        uploaded_at: row.try_get("uploaded_at").map_err(ser)?,
    })
}

pub(crate) fn map_chunk_row(row: &SqliteRow) -> Result<ResourceChunk, StorageError> {
    let blob: Vec<u8> = row.try_get("embedding").map_err(ser)?;
    Ok(ResourceChunk {
        resource_id: id(row, "resource_id")?,
        ordinal: u32_col(row, "ordinal")?,
        text: row.try_get("text").map_err(ser)?,
        embedding: embedding_from_blob(&blob)?,
    })
}

pub(crate) fn map_analytics_row(row: &SqliteRow) -> Result<DailyAnalytics, StorageError> {
    Ok(DailyAnalytics {
        user_id: id(row, "user_id")?,
        date: row.try_get("date").map_err(ser)?,
        topics_covered: from_json(row, "topics_covered")?,
        quizzes_attempted: u32_col(row, "quizzes_attempted")?,
        avg_quiz_score: row.try_get("avg_quiz_score").map_err(ser)?,
        hours_studied: row.try_get("hours_studied").map_err(ser)?,
        tasks_completed: u32_col(row, "tasks_completed")?,
        streak_maintained: bool_col(row, "streak_maintained")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_round_trip() {
        let v = vec![0.25_f32, -1.5, 3.0];
        let blob = embedding_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(embedding_from_blob(&blob).unwrap(), v);
        assert!(embedding_from_blob(&blob[..5]).is_err());
    }
}
