//! SQLite implementation of the AttemptRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssessmentAttempt, Difficulty};
use crate::domain::ports::AttemptRepository;

const ATTEMPT_COLUMNS: &str = "id, attempt_key, user_id, subject, course, final_difficulty, steps_taken, mistakes, correct_total, question_total, accuracy, created_at";

#[derive(Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn record(&self, attempt: &AssessmentAttempt) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO assessment_attempts (id, attempt_key, user_id, subject, course, final_difficulty, steps_taken, mistakes, correct_total, question_total, accuracy, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(attempt_key) DO NOTHING"#,
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.attempt_key)
        .bind(&attempt.user_id)
        .bind(&attempt.subject)
        .bind(&attempt.course)
        .bind(attempt.final_difficulty.as_str())
        .bind(i64::from(attempt.steps_taken))
        .bind(i64::from(attempt.mistakes))
        .bind(i64::from(attempt.correct_total))
        .bind(i64::from(attempt.question_total))
        .bind(attempt.accuracy)
        .bind(attempt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_user(&self, user_id: &str, limit: u32) -> DomainResult<Vec<AssessmentAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE user_id = ? ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_by_key(&self, attempt_key: &str) -> DomainResult<Option<AssessmentAttempt>> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE attempt_key = ?"
        ))
        .bind(attempt_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    attempt_key: String,
    user_id: String,
    subject: String,
    course: String,
    final_difficulty: String,
    steps_taken: i64,
    mistakes: i64,
    correct_total: i64,
    question_total: i64,
    accuracy: f64,
    created_at: String,
}

fn column_u32(name: &str, value: i64) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("{name} out of range: {value}")))
}

impl TryFrom<AttemptRow> for AssessmentAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let final_difficulty = Difficulty::from_str(&row.final_difficulty).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid difficulty: {}", row.final_difficulty))
        })?;

        Ok(AssessmentAttempt {
            id: parse_uuid(&row.id)?,
            attempt_key: row.attempt_key,
            user_id: row.user_id,
            subject: row.subject,
            course: row.course,
            final_difficulty,
            steps_taken: column_u32("steps_taken", row.steps_taken)?,
            mistakes: column_u32("mistakes", row.mistakes)?,
            correct_total: column_u32("correct_total", row.correct_total)?,
            question_total: column_u32("question_total", row.question_total)?,
            accuracy: row.accuracy,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
