use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL,
            age_group TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login TEXT,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS student_profiles (
            user_id TEXT PRIMARY KEY,
            topics TEXT NOT NULL,
            levels TEXT NOT NULL,
            hours_per_day INTEGER NOT NULL CHECK (hours_per_day >= 0),
            target_date TEXT,
            study_start_date TEXT,
            last_active_date TEXT,
            current_day INTEGER NOT NULL DEFAULT 1 CHECK (current_day >= 1),
            total_planned_days INTEGER NOT NULL DEFAULT 30 CHECK (total_planned_days >= 0),
            days_remaining INTEGER CHECK (days_remaining >= 0),
            streak INTEGER NOT NULL DEFAULT 0 CHECK (streak >= 0),
            timezone TEXT,
            onboarding_completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS study_plans (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            day_number INTEGER NOT NULL CHECK (day_number >= 1),
            plan_date TEXT NOT NULL,
            topic TEXT NOT NULL,
            subtopics TEXT NOT NULL,
            tasks TEXT NOT NULL,
            estimated_hours REAL NOT NULL,
            actual_hours REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
            completed_at TEXT,
            UNIQUE (user_id, day_number),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quizzes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            topic TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('mcq', 'descriptive', 'coding')),
            day_number INTEGER,
            questions TEXT NOT NULL,
            score INTEGER CHECK (score >= 0),
            max_score INTEGER NOT NULL CHECK (max_score >= 0),
            time_taken_secs INTEGER,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed')),
            created_at TEXT NOT NULL,
            attempted_at TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_responses (
            id INTEGER PRIMARY KEY,
            quiz_id TEXT NOT NULL,
            question_number INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            student_answer TEXT NOT NULL,
            correct_answer TEXT,
            is_correct INTEGER NOT NULL,
            points INTEGER NOT NULL CHECK (points >= 0),
            feedback TEXT NOT NULL,
            FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            context TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chat_messages (
            seq INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'ai')),
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            message_type TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_type TEXT NOT NULL,
            topic TEXT,
            extracted_text TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            embeddings_generated INTEGER NOT NULL DEFAULT 0,
            uploaded_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS resource_chunks (
            resource_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (resource_id, ordinal),
            FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS daily_analytics (
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            topics_covered TEXT NOT NULL,
            quizzes_attempted INTEGER NOT NULL DEFAULT 0,
            avg_quiz_score REAL NOT NULL DEFAULT 0,
            hours_studied REAL NOT NULL DEFAULT 0,
            tasks_completed INTEGER NOT NULL DEFAULT 0,
            streak_maintained INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, date),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quizzes_user_status_attempted
            ON quizzes (user_id, status, attempted_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_responses_quiz
            ON quiz_responses (quiz_id, question_number);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_user_started
            ON chat_sessions (user_id, started_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, seq);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_resources_user_uploaded
            ON resources (user_id, uploaded_at);
    ",
];

/// Applies pending schema versions, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    let versions: &[(i64, &[&str])] = &[(1, SCHEMA_V1)];

    for (version, statements) in versions {
        if is_applied(pool, *version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;

        for statement in *statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(*version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
