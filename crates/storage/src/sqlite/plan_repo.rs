use sqlx::SqliteConnection;
use study_core::model::{PlanId, StudyDay, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_day_row, to_json};
use crate::repository::{PlanRepository, StorageError};

const DAY_COLUMNS: &str = "id, user_id, day_number, plan_date, topic, subtopics, tasks, \
     estimated_hours, actual_hours, status, completed_at";

async fn insert_day_row(conn: &mut SqliteConnection, day: &StudyDay) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO study_plans (
            id, user_id, day_number, plan_date, topic, subtopics, tasks,
            estimated_hours, actual_hours, status, completed_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ",
    )
    .bind(day.id.to_string())
    .bind(day.user_id.to_string())
    .bind(i64::from(day.day_number))
    .bind(day.plan_date)
    .bind(&day.topic)
    .bind(to_json(&day.subtopics)?)
    .bind(to_json(&day.tasks)?)
    .bind(day.estimated_hours)
    .bind(day.actual_hours)
    .bind(day.status.as_str())
    .bind(day.completed_at)
    .execute(conn)
    .await
    .map_err(db)?;
    Ok(())
}

pub(super) async fn update_day_row(
    conn: &mut SqliteConnection,
    day: &StudyDay,
) -> Result<(), StorageError> {
    let res = sqlx::query(
        r"
        UPDATE study_plans SET
            tasks = ?2,
            actual_hours = ?3,
            status = ?4,
            completed_at = ?5
        WHERE id = ?1
        ",
    )
    .bind(day.id.to_string())
    .bind(to_json(&day.tasks)?)
    .bind(day.actual_hours)
    .bind(day.status.as_str())
    .bind(day.completed_at)
    .execute(conn)
    .await
    .map_err(db)?;

    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

/// Delete every plan row of `user_id` and insert `days`; callers own the transaction.
pub(super) async fn replace_day_rows(
    conn: &mut SqliteConnection,
    user_id: UserId,
    days: &[StudyDay],
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM study_plans WHERE user_id = ?1")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db)?;

    for day in days {
        insert_day_row(&mut *conn, day).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl PlanRepository for SqliteRepository {
    async fn replace_plan(&self, user_id: UserId, days: &[StudyDay]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        replace_day_rows(&mut *tx, user_id, days).await?;
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn get_day(&self, id: PlanId) -> Result<StudyDay, StorageError> {
        let row = sqlx::query(&format!("SELECT {DAY_COLUMNS} FROM study_plans WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_day_row(&row)
    }

    async fn find_day(&self, user_id: UserId, day_number: u32) -> Result<Option<StudyDay>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {DAY_COLUMNS} FROM study_plans WHERE user_id = ?1 AND day_number = ?2"
        ))
        .bind(user_id.to_string())
        .bind(i64::from(day_number))
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(map_day_row).transpose()
    }

    async fn list_plan(&self, user_id: UserId) -> Result<Vec<StudyDay>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {DAY_COLUMNS} FROM study_plans WHERE user_id = ?1 ORDER BY day_number ASC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_day_row).collect()
    }

    async fn update_day(&self, day: &StudyDay) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        update_day_row(&mut conn, day).await
    }
}
