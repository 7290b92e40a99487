//! Profile store port - long-lived learner profiles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::SubjectCourse;

/// A learner profile as far as assessment bootstrap is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub user_id: String,
    pub subject: String,
    pub course: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl LearnerProfile {
    pub fn new(user_id: impl Into<String>, target: SubjectCourse) -> Self {
        Self {
            user_id: user_id.into(),
            subject: target.subject,
            course: target.course,
            interests: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn target(&self) -> SubjectCourse {
        SubjectCourse::new(self.subject.clone(), self.course.clone())
    }
}

/// Repository trait for learner profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Default subject/course for a learner.
    ///
    /// # Returns
    /// - `Some(target)` if the learner has a profile
    /// - `None` if not
    async fn default_subject_course(&self, user_id: &str) -> DomainResult<Option<SubjectCourse>>;

    /// Create or replace a learner profile.
    async fn upsert(&self, profile: &LearnerProfile) -> DomainResult<()>;

    /// Fetch a learner profile.
    async fn get(&self, user_id: &str) -> DomainResult<Option<LearnerProfile>>;
}
