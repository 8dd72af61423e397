use chrono::NaiveDate;
use sqlx::SqliteConnection;
use study_core::model::{DailyAnalytics, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_analytics_row, to_json};
use crate::repository::{AnalyticsRepository, StorageError};

pub(super) async fn upsert_analytics(
    conn: &mut SqliteConnection,
    row: &DailyAnalytics,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO daily_analytics (
            user_id, date, topics_covered, quizzes_attempted, avg_quiz_score,
            hours_studied, tasks_completed, streak_maintained
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(user_id, date) DO UPDATE SET
            topics_covered = excluded.topics_covered,
            quizzes_attempted = excluded.quizzes_attempted,
            avg_quiz_score = excluded.avg_quiz_score,
            hours_studied = excluded.hours_studied,
            tasks_completed = excluded.tasks_completed,
            streak_maintained = excluded.streak_maintained
        ",
    )
    .bind(row.user_id.to_string())
    .bind(row.date)
    .bind(to_json(&row.topics_covered)?)
    .bind(i64::from(row.quizzes_attempted))
    .bind(row.avg_quiz_score)
    .bind(row.hours_studied)
    .bind(i64::from(row.tasks_completed))
    .bind(i64::from(row.streak_maintained))
    .execute(conn)
    .await
    .map_err(db)?;
    Ok(())
}

#[async_trait::async_trait]
impl AnalyticsRepository for SqliteRepository {
    async fn record_day(&self, row: &DailyAnalytics) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        upsert_analytics(&mut conn, row).await
    }

    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                user_id, date, topics_covered, quizzes_attempted, avg_quiz_score,
                hours_studied, tasks_completed, streak_maintained
            FROM daily_analytics
            WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date ASC
            ",
        )
        .bind(user_id.to_string())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_analytics_row).collect()
    }
}
