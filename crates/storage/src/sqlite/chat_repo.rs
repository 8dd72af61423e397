use sqlx::SqliteConnection;
use study_core::model::{ChatMessage, ChatSession, SessionId, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_message_row, map_session_row, to_json};
use crate::repository::{ChatRepository, StorageError};

const SESSION_COLUMNS: &str = "id, user_id, started_at, ended_at, message_count, context";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, timestamp, message_type";

async fn update_session_row(
    conn: &mut SqliteConnection,
    session: &ChatSession,
) -> Result<(), StorageError> {
    let res = sqlx::query(
        r"
        UPDATE chat_sessions SET
            ended_at = ?2,
            message_count = ?3,
            context = ?4
        WHERE id = ?1
        ",
    )
    .bind(session.id.to_string())
    .bind(session.ended_at)
    .bind(i64::from(session.message_count))
    .bind(to_json(&session.context)?)
    .execute(conn)
    .await
    .map_err(db)?;

    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

#[async_trait::async_trait]
impl ChatRepository for SqliteRepository {
    async fn open_session(&self, user_id: UserId) -> Result<Option<ChatSession>, StorageError> {
        let row = sqlx::query(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM chat_sessions
            WHERE user_id = ?1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_session_row).transpose()
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO chat_sessions (id, user_id, started_at, ended_at, message_count, context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(i64::from(session.message_count))
        .bind(to_json(&session.context)?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<ChatSession, StorageError> {
        let row = sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_session_row(&row)
    }

    async fn update_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        update_session_row(&mut conn, session).await
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = ?1 ORDER BY started_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_session_row).collect()
    }

    async fn append_message(&self, session: &ChatSession, message: &ChatMessage) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        update_session_row(&mut *tx, session).await?;

        sqlx::query(
            r"
            INSERT INTO chat_messages (id, session_id, role, content, timestamp, message_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .bind(&message.message_type)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn recent_messages(&self, session_id: SessionId, limit: u32) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE session_id = ?1
            ORDER BY seq DESC
            LIMIT ?2
            "
        ))
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let mut messages = rows
            .iter()
            .map(map_message_row)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn first_message(&self, session_id: SessionId) -> Result<Option<ChatMessage>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = ?1 ORDER BY seq ASC LIMIT 1"
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_message_row).transpose()
    }
}
