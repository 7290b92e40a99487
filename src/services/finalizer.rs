//! Session finalizer.
//!
//! Records a finished attempt exactly once and triggers learning path
//! generation in the background. The learner never waits on either: a
//! persistence failure is logged, not surfaced.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AssessmentAttempt, FinishRequest, PathRequest, NEUTRAL_ACCURACY};
use crate::domain::ports::{AttemptRepository, PathBuilder};

/// What happened to a finish call after validation.
#[derive(Debug)]
pub enum FinishOutcome {
    /// New attempt stored; path generation runs on `path_job`.
    Recorded {
        attempt_id: Uuid,
        path_job: JoinHandle<()>,
    },
    /// This session was already recorded.
    Duplicate,
    /// The store refused the write; nothing else was triggered.
    PersistenceFailed,
}

impl FinishOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

pub struct SessionFinalizer {
    attempts: Arc<dyn AttemptRepository>,
    paths: Arc<dyn PathBuilder>,
    neutral_accuracy: f64,
}

impl SessionFinalizer {
    pub fn new(attempts: Arc<dyn AttemptRepository>, paths: Arc<dyn PathBuilder>) -> Self {
        Self {
            attempts,
            paths,
            neutral_accuracy: NEUTRAL_ACCURACY,
        }
    }

    #[must_use]
    pub fn with_neutral_accuracy(mut self, neutral_accuracy: f64) -> Self {
        self.neutral_accuracy = neutral_accuracy;
        self
    }

    /// Record a finished session.
    ///
    /// # Errors
    /// Only validation errors. Storage and path builder failures are logged.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn finish(&self, user_id: &str, request: &FinishRequest) -> DomainResult<FinishOutcome> {
        request.validate()?;

        let attempt = AssessmentAttempt::new(
            user_id,
            &request.state,
            request.correct_total,
            request.question_total,
            self.neutral_accuracy,
        );

        match self.attempts.record(&attempt).await {
            Ok(true) => {
                info!(
                    attempt_id = %attempt.id,
                    subject = %attempt.subject,
                    accuracy = attempt.accuracy,
                    final_difficulty = %attempt.final_difficulty,
                    "assessment attempt recorded"
                );
                let path_job = self.spawn_path_generation(PathRequest::from(&attempt));
                Ok(FinishOutcome::Recorded {
                    attempt_id: attempt.id,
                    path_job,
                })
            }
            Ok(false) => {
                info!(attempt_key = %attempt.attempt_key, "duplicate finish ignored");
                Ok(FinishOutcome::Duplicate)
            }
            Err(e) => {
                error!(error = %e, attempt_key = %attempt.attempt_key, "failed to record attempt");
                Ok(FinishOutcome::PersistenceFailed)
            }
        }
    }

    fn spawn_path_generation(&self, request: PathRequest) -> JoinHandle<()> {
        let paths = Arc::clone(&self.paths);
        tokio::spawn(async move {
            match paths.generate(&request).await {
                Ok(path) => info!(
                    user_id = %request.user_id,
                    path_id = ?path.id,
                    lessons = path.lessons.len(),
                    "learning path generated"
                ),
                Err(e) => warn!(
                    user_id = %request.user_id,
                    error = %e,
                    "learning path generation failed"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::models::{AssessmentState, Difficulty, LearningPath, SubjectCourse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryAttempts {
        rows: Mutex<HashMap<String, AssessmentAttempt>>,
        broken: bool,
    }

    #[async_trait]
    impl AttemptRepository for MemoryAttempts {
        async fn record(&self, attempt: &AssessmentAttempt) -> DomainResult<bool> {
            if self.broken {
                return Err(DomainError::DatabaseError("disk full".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&attempt.attempt_key) {
                return Ok(false);
            }
            rows.insert(attempt.attempt_key.clone(), attempt.clone());
            Ok(true)
        }

        async fn list_for_user(&self, user_id: &str, _limit: u32) -> DomainResult<Vec<AssessmentAttempt>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn get_by_key(&self, attempt_key: &str) -> DomainResult<Option<AssessmentAttempt>> {
            Ok(self.rows.lock().unwrap().get(attempt_key).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingPaths {
        requests: Mutex<Vec<PathRequest>>,
    }

    #[async_trait]
    impl PathBuilder for RecordingPaths {
        async fn generate(&self, request: &PathRequest) -> DomainResult<LearningPath> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LearningPath::default())
        }
    }

    fn finished_state() -> AssessmentState {
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![],
        );
        state.step = 7;
        state.mistakes = 1;
        state.difficulty = Difficulty::Medium;
        state.done = true;
        state
    }

    fn finalizer(
        attempts: MemoryAttempts,
    ) -> (SessionFinalizer, Arc<MemoryAttempts>, Arc<RecordingPaths>) {
        let attempts = Arc::new(attempts);
        let paths = Arc::new(RecordingPaths::default());
        (
            SessionFinalizer::new(attempts.clone(), paths.clone()),
            attempts,
            paths,
        )
    }

    #[tokio::test]
    async fn test_records_and_triggers_path() {
        let (finalizer, attempts, paths) = finalizer(MemoryAttempts::default());
        let request = FinishRequest {
            state: finished_state(),
            correct_total: 5,
            question_total: 6,
        };

        let outcome = finalizer.finish("u1", &request).await.unwrap();
        let FinishOutcome::Recorded { path_job, .. } = outcome else {
            panic!("expected Recorded, got {outcome:?}");
        };
        path_job.await.unwrap();

        let stored = attempts.list_for_user("u1", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].steps_taken, 6);
        assert!((stored[0].accuracy - 5.0 / 6.0).abs() < f64::EPSILON);

        let sent = paths.requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].accuracy_pct, 83);
        assert_eq!(sent[0].subject, "Math");
    }

    #[tokio::test]
    async fn test_duplicate_finish_records_once() {
        let (finalizer, attempts, paths) = finalizer(MemoryAttempts::default());
        let request = FinishRequest {
            state: finished_state(),
            correct_total: 3,
            question_total: 6,
        };

        if let FinishOutcome::Recorded { path_job, .. } =
            finalizer.finish("u1", &request).await.unwrap()
        {
            path_job.await.unwrap();
        }
        let second = finalizer.finish("u1", &request).await.unwrap();

        assert!(matches!(second, FinishOutcome::Duplicate));
        assert_eq!(attempts.list_for_user("u1", 10).await.unwrap().len(), 1);
        assert_eq!(paths.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_questions_uses_neutral_accuracy() {
        let (finalizer, attempts, _) = finalizer(MemoryAttempts::default());
        let request = FinishRequest {
            state: finished_state(),
            correct_total: 0,
            question_total: 0,
        };
        if let FinishOutcome::Recorded { path_job, .. } =
            finalizer.finish("u1", &request).await.unwrap()
        {
            path_job.await.unwrap();
        }

        let stored = attempts.list_for_user("u1", 10).await.unwrap();
        assert!((stored[0].accuracy - NEUTRAL_ACCURACY).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let (finalizer, _, paths) = finalizer(MemoryAttempts {
            broken: true,
            ..Default::default()
        });
        let request = FinishRequest {
            state: finished_state(),
            correct_total: 2,
            question_total: 4,
        };

        let outcome = finalizer.finish("u1", &request).await.unwrap();
        assert!(matches!(outcome, FinishOutcome::PersistenceFailed));
        assert!(paths.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_totals_rejected() {
        let (finalizer, attempts, _) = finalizer(MemoryAttempts::default());
        let request = FinishRequest {
            state: finished_state(),
            correct_total: 5,
            question_total: 4,
        };

        let err = finalizer.finish("u1", &request).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert!(attempts.rows.lock().unwrap().is_empty());
    }
}
