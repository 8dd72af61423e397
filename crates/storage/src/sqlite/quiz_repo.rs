use study_core::model::{Quiz, QuizId, QuizResponse, UserId};

use super::SqliteRepository;
use super::mapping::{db, map_quiz_row, map_response_row, to_json};
use crate::repository::{QuizRepository, StorageError};

const QUIZ_COLUMNS: &str = "id, user_id, topic, kind, day_number, questions, score, max_score, \
     time_taken_secs, status, created_at, attempted_at";

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO quizzes (
                id, user_id, topic, kind, day_number, questions, score, max_score,
                time_taken_secs, status, created_at, attempted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(quiz.id.to_string())
        .bind(quiz.user_id.to_string())
        .bind(&quiz.topic)
        .bind(quiz.kind.as_str())
        .bind(quiz.day_number.map(i64::from))
        .bind(to_json(&quiz.questions)?)
        .bind(quiz.score.map(i64::from))
        .bind(i64::from(quiz.max_score))
        .bind(quiz.time_taken_secs.map(i64::from))
        .bind(quiz.status.as_str())
        .bind(quiz.created_at)
        .bind(quiz.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, StorageError> {
        let row = sqlx::query(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_quiz_row(&row)
    }

    async fn complete_quiz(&self, quiz: &Quiz, responses: &[QuizResponse]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            r"
            UPDATE quizzes SET
                score = ?2,
                time_taken_secs = ?3,
                status = ?4,
                attempted_at = ?5
            WHERE id = ?1
            ",
        )
        .bind(quiz.id.to_string())
        .bind(quiz.score.map(i64::from))
        .bind(quiz.time_taken_secs.map(i64::from))
        .bind(quiz.status.as_str())
        .bind(quiz.attempted_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM quiz_responses WHERE quiz_id = ?1")
            .bind(quiz.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for response in responses {
            let graded = &response.graded;
            sqlx::query(
                r"
                INSERT INTO quiz_responses (
                    quiz_id, question_number, question_text, student_answer,
                    correct_answer, is_correct, points, feedback
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(response.quiz_id.to_string())
            .bind(i64::from(graded.question_number))
            .bind(&graded.question)
            .bind(&graded.student_answer)
            .bind(&graded.correct_answer)
            .bind(i64::from(graded.is_correct))
            .bind(i64::from(graded.points))
            .bind(&graded.feedback)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn list_completed(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<Quiz>, StorageError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);
        let rows = sqlx::query(&format!(
            r"
            SELECT {QUIZ_COLUMNS} FROM quizzes
            WHERE user_id = ?1 AND status = 'completed'
            ORDER BY attempted_at DESC
            LIMIT ?2
            "
        ))
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_quiz_row).collect()
    }

    async fn list_for_day(&self, user_id: UserId, day_number: u32) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {QUIZ_COLUMNS} FROM quizzes
            WHERE user_id = ?1 AND day_number = ?2 AND status = 'completed'
            "
        ))
        .bind(user_id.to_string())
        .bind(i64::from(day_number))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_quiz_row).collect()
    }

    async fn list_responses(&self, quiz_id: QuizId) -> Result<Vec<QuizResponse>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                quiz_id, question_number, question_text, student_answer,
                correct_answer, is_correct, points, feedback
            FROM quiz_responses
            WHERE quiz_id = ?1
            ORDER BY question_number ASC
            ",
        )
        .bind(quiz_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_response_row).collect()
    }
}
