use study_core::model::{StudentProfile, User, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_user_row};
use super::profile_repo::upsert_profile;
use crate::repository::{StorageError, UserRepository};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, age_group, is_active, last_login, created_at";

/// Tables holding rows owned by a user, children before parents.
const OWNED_TABLES: &[&str] = &[
    "DELETE FROM resource_chunks WHERE resource_id IN (SELECT id FROM resources WHERE user_id = ?1)",
    "DELETE FROM resources WHERE user_id = ?1",
    "DELETE FROM chat_messages WHERE session_id IN (SELECT id FROM chat_sessions WHERE user_id = ?1)",
    "DELETE FROM chat_sessions WHERE user_id = ?1",
    "DELETE FROM quiz_responses WHERE quiz_id IN (SELECT id FROM quizzes WHERE user_id = ?1)",
    "DELETE FROM quizzes WHERE user_id = ?1",
    "DELETE FROM study_plans WHERE user_id = ?1",
    "DELETE FROM daily_analytics WHERE user_id = ?1",
];

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: &User, profile: &StudentProfile) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO users (
                id, username, email, password_hash, full_name, age_group,
                is_active, last_login, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.age_group)
        .bind(i64::from(user.is_active))
        .bind(user.last_login)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        upsert_profile(&mut *tx, profile).await?;

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_user_row(&row)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1 LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn login_taken(&self, username: &str, email: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ?1 OR email = ?2 LIMIT 1")
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.is_some())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE users SET
                email = ?2,
                password_hash = ?3,
                full_name = ?4,
                age_group = ?5,
                is_active = ?6,
                last_login = ?7
            WHERE id = ?1
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.age_group)
        .bind(i64::from(user.is_active))
        .bind(user.last_login)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn clear_user_data(&self, id: UserId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        for statement in OWNED_TABLES {
            sqlx::query(statement)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        for statement in OWNED_TABLES {
            sqlx::query(statement)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }
        sqlx::query("DELETE FROM student_profiles WHERE user_id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        let res = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        tx.commit().await.map_err(db)?;
        Ok(())
    }
}
