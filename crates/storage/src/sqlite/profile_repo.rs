use sqlx::SqliteConnection;
use study_core::model::{DailyAnalytics, StudentProfile, StudyDay, UserId};

use super::SqliteRepository;
use super::analytics_repo::upsert_analytics;
use super::mapping::{db, map_profile_row, to_json};
use super::plan_repo::{replace_day_rows, update_day_row};
use crate::repository::{ProfileRepository, StorageError};

pub(super) async fn upsert_profile(
    conn: &mut SqliteConnection,
    profile: &StudentProfile,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO student_profiles (
            user_id, topics, levels, hours_per_day, target_date, study_start_date,
            last_active_date, current_day, total_planned_days, days_remaining, streak,
            timezone, onboarding_completed, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(user_id) DO UPDATE SET
            topics = excluded.topics,
            levels = excluded.levels,
            hours_per_day = excluded.hours_per_day,
            target_date = excluded.target_date,
            study_start_date = excluded.study_start_date,
            last_active_date = excluded.last_active_date,
            current_day = excluded.current_day,
            total_planned_days = excluded.total_planned_days,
            days_remaining = excluded.days_remaining,
            streak = excluded.streak,
            timezone = excluded.timezone,
            onboarding_completed = excluded.onboarding_completed,
            updated_at = excluded.updated_at
        ",
    )
    .bind(profile.user_id.to_string())
    .bind(to_json(&profile.topics)?)
    .bind(to_json(&profile.levels)?)
    .bind(i64::from(profile.hours_per_day))
    .bind(profile.target_date)
    .bind(profile.study_start_date)
    .bind(profile.last_active_date)
    .bind(i64::from(profile.current_day))
    .bind(i64::from(profile.total_planned_days))
    .bind(profile.days_remaining.map(i64::from))
    .bind(i64::from(profile.streak))
    .bind(&profile.timezone)
    .bind(i64::from(profile.onboarding_completed))
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(conn)
    .await
    .map_err(db)?;

    Ok(())
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<StudentProfile, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, topics, levels, hours_per_day, target_date, study_start_date,
                last_active_date, current_day, total_planned_days, days_remaining, streak,
                timezone, onboarding_completed, created_at, updated_at
            FROM student_profiles
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;
        map_profile_row(&row)
    }

    async fn save_profile(&self, profile: &StudentProfile) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        upsert_profile(&mut conn, profile).await
    }

    async fn save_progress(
        &self,
        profile: &StudentProfile,
        days: &[StudyDay],
        analytics: Option<&DailyAnalytics>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        upsert_profile(&mut *tx, profile).await?;
        for day in days {
            update_day_row(&mut *tx, day).await?;
        }
        if let Some(row) = analytics {
            upsert_analytics(&mut *tx, row).await?;
        }
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn save_with_plan(&self, profile: &StudentProfile, days: &[StudyDay]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        upsert_profile(&mut *tx, profile).await?;
        replace_day_rows(&mut *tx, profile.user_id, days).await?;
        tx.commit().await.map_err(db)?;
        Ok(())
    }
}
