//! SQLite implementation of the ProfileStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_json_or_default};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SubjectCourse;
use crate::domain::ports::{LearnerProfile, ProfileStore};

#[derive(Clone)]
pub struct SqliteProfileRepository {
    pool: SqlitePool,
}

impl SqliteProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileRepository {
    async fn default_subject_course(&self, user_id: &str) -> DomainResult<Option<SubjectCourse>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT subject, course FROM learner_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(subject, course)| SubjectCourse::new(subject, course)))
    }

    async fn upsert(&self, profile: &LearnerProfile) -> DomainResult<()> {
        let interests_json = serde_json::to_string(&profile.interests)?;

        sqlx::query(
            r#"INSERT INTO learner_profiles (user_id, subject, course, interests, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                   subject = excluded.subject,
                   course = excluded.course,
                   interests = excluded.interests,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&profile.user_id)
        .bind(&profile.subject)
        .bind(&profile.course)
        .bind(&interests_json)
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: &str) -> DomainResult<Option<LearnerProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT user_id, subject, course, interests, updated_at FROM learner_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    subject: String,
    course: String,
    interests: Option<String>,
    updated_at: String,
}

impl TryFrom<ProfileRow> for LearnerProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(LearnerProfile {
            user_id: row.user_id,
            subject: row.subject,
            course: row.course,
            interests: parse_json_or_default(row.interests)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteProfileRepository {
        SqliteProfileRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_default() {
        let repo = setup_test_repo().await;
        assert!(repo.default_subject_course("ghost").await.unwrap().is_none());
        assert!(repo.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_default() {
        let repo = setup_test_repo().await;
        let mut profile = LearnerProfile::new("u1", SubjectCourse::new("Science", "Biology"));
        profile.interests = vec!["plants".to_string(), "genetics".to_string()];
        repo.upsert(&profile).await.unwrap();

        let target = repo.default_subject_course("u1").await.unwrap().unwrap();
        assert_eq!(target, SubjectCourse::new("Science", "Biology"));

        let stored = repo.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.interests, vec!["plants", "genetics"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let repo = setup_test_repo().await;
        repo.upsert(&LearnerProfile::new("u1", SubjectCourse::new("Math", "Algebra 1")))
            .await
            .unwrap();
        repo.upsert(&LearnerProfile::new("u1", SubjectCourse::new("Math", "Geometry")))
            .await
            .unwrap();

        let target = repo.default_subject_course("u1").await.unwrap().unwrap();
        assert_eq!(target.course, "Geometry");
    }
}
