//! Speculation coordinator.
//!
//! Serves one turn of the stateless protocol. Given the inbound state and
//! optionally the learner's last answer, it recomputes the authoritative
//! current state and generates the current item together with the items of
//! both hypothetical next turns, so the client already holds the next
//! question whichever way the learner answers.
//!
//! Nothing is kept between calls.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    advance, branch_states, AssessmentConfig, AssessmentState, Branch, Branches, Difficulty,
    NextRequest, NextResponse, SubjectCourse,
};
use crate::domain::ports::ProfileStore;
use crate::services::item_adapter::ItemAdapter;

/// Session parameters fixed at bootstrap.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub max_steps: u32,
    pub starting_difficulty: Difficulty,
    pub default_target: SubjectCourse,
    /// Bound on the three-way generation fan-in
    pub fan_in_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&AssessmentConfig::default())
    }
}

impl From<&AssessmentConfig> for CoordinatorSettings {
    fn from(config: &AssessmentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            starting_difficulty: config.starting_difficulty,
            default_target: SubjectCourse::new(
                config.default_subject.clone(),
                config.default_course.clone(),
            ),
            fan_in_timeout: Duration::from_secs(config.fan_in_timeout_secs),
        }
    }
}

/// Computes the current turn and both speculative branches.
pub struct SpeculationCoordinator {
    items: Arc<ItemAdapter>,
    profiles: Arc<dyn ProfileStore>,
    settings: CoordinatorSettings,
}

impl SpeculationCoordinator {
    pub fn new(
        items: Arc<ItemAdapter>,
        profiles: Arc<dyn ProfileStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            items,
            profiles,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Serve one `next` call.
    ///
    /// # Errors
    /// - `ValidationFailed` / `InvalidStateTransition` for malformed requests,
    ///   before any generation starts
    /// - `ProfileUnavailable` if bootstrap could not consult the profile store
    /// - `GenerationTimeout` if the fan-in exceeds its bound
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn next(&self, user_id: &str, request: NextRequest) -> DomainResult<NextResponse> {
        let state = self.resolve_state(user_id, request).await?;

        if state.done {
            info!(
                subject = %state.subject,
                step = state.step,
                mistakes = state.mistakes,
                "assessment reached terminal state"
            );
            return Ok(NextResponse::terminal(state));
        }

        let (right_state, wrong_state) = branch_states(&state);

        let fan_in = async {
            tokio::join!(
                self.items.generate(&state),
                self.items.generate(&right_state),
                self.items.generate(&wrong_state),
            )
        };

        let (item, right_item, wrong_item) =
            tokio::time::timeout(self.settings.fan_in_timeout, fan_in)
                .await
                .map_err(|_| {
                    warn!(
                        timeout_ms = self.settings.fan_in_timeout.as_millis(),
                        step = state.step,
                        "generation fan-in timed out"
                    );
                    DomainError::GenerationTimeout(self.settings.fan_in_timeout)
                })?;

        debug!(
            step = state.step,
            difficulty = %state.difficulty,
            current = item.is_some(),
            right = right_item.is_some(),
            wrong = wrong_item.is_some(),
            "speculation fan-in complete"
        );

        Ok(NextResponse {
            state,
            item,
            branches: Some(Branches {
                right: Branch {
                    state: right_state,
                    item: right_item,
                },
                wrong: Branch {
                    state: wrong_state,
                    item: wrong_item,
                },
            }),
        })
    }

    /// Validate the request and compute the authoritative current state.
    async fn resolve_state(
        &self,
        user_id: &str,
        request: NextRequest,
    ) -> DomainResult<AssessmentState> {
        let Some(mut state) = request.state.clone() else {
            if request.last_answer.is_some() || request.last_item.is_some() {
                return Err(DomainError::ValidationFailed(
                    "an answer requires the state it answers".to_string(),
                ));
            }
            return self.bootstrap(user_id, &request).await;
        };

        state.validate()?;
        // States built outside this server still get an idempotency key
        if state.session_id.is_none() {
            state.session_id = Some(uuid::Uuid::new_v4());
        }

        match (request.last_answer, request.last_item) {
            (None, None) => Ok(state),
            (Some(answer), Some(item)) => {
                item.validate()?;
                if !item.belongs_to(&state) {
                    return Err(DomainError::ValidationFailed(format!(
                        "lastItem is for {}/{}, state is for {}/{}",
                        item.subject, item.course, state.subject, state.course
                    )));
                }
                if answer >= item.choices.len() {
                    return Err(DomainError::ValidationFailed(format!(
                        "lastAnswer {answer} out of range for {} choices",
                        item.choices.len()
                    )));
                }
                if state.done {
                    return Err(DomainError::InvalidStateTransition {
                        reason: "state is terminal; no further answers are accepted".to_string(),
                    });
                }
                Ok(advance(&state, item.is_correct(answer)))
            }
            _ => Err(DomainError::ValidationFailed(
                "lastAnswer and lastItem must be supplied together".to_string(),
            )),
        }
    }

    /// Build a fresh state from the request, the learner profile, or the
    /// configured defaults, in that order.
    async fn bootstrap(&self, user_id: &str, request: &NextRequest) -> DomainResult<AssessmentState> {
        let target = match request.explicit_target()? {
            Some(target) => target,
            None => self
                .profiles
                .default_subject_course(user_id)
                .await
                .map_err(|e| DomainError::ProfileUnavailable(e.to_string()))?
                .unwrap_or_else(|| self.settings.default_target.clone()),
        };
        for entry in &request.remaining {
            entry.validate()?;
        }

        info!(
            subject = %target.subject,
            course = %target.course,
            max_steps = self.settings.max_steps,
            "bootstrapping assessment session"
        );

        Ok(AssessmentState::new(
            target,
            self.settings.max_steps,
            self.settings.starting_difficulty,
            request.remaining.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AssessmentItem;
    use crate::domain::ports::{ItemGenerator, LearnerProfile};
    use crate::services::safety_filter::SafetyFilter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Emits a valid item whose prompt names the step and difficulty, except
    /// for difficulties listed in `fail_at`.
    struct LadderGenerator {
        fail_at: Vec<Difficulty>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl LadderGenerator {
        fn new() -> Self {
            Self {
                fail_at: vec![],
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ItemGenerator for LadderGenerator {
        fn name(&self) -> &'static str {
            "ladder"
        }

        async fn generate(&self, state: &AssessmentState) -> DomainResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_at.contains(&state.difficulty) {
                return Err(DomainError::GenerationFailed("unavailable".to_string()));
            }
            Ok(serde_json::json!({
                "prompt": format!("step {} at {}", state.step, state.difficulty),
                "choices": ["a", "b", "c"],
                "correctIndex": 0,
            })
            .to_string())
        }
    }

    #[derive(Default)]
    struct MapProfiles {
        targets: Mutex<HashMap<String, SubjectCourse>>,
        broken: bool,
    }

    #[async_trait]
    impl ProfileStore for MapProfiles {
        async fn default_subject_course(&self, user_id: &str) -> DomainResult<Option<SubjectCourse>> {
            if self.broken {
                return Err(DomainError::DatabaseError("connection refused".to_string()));
            }
            Ok(self.targets.lock().unwrap().get(user_id).cloned())
        }

        async fn upsert(&self, profile: &LearnerProfile) -> DomainResult<()> {
            self.targets
                .lock()
                .unwrap()
                .insert(profile.user_id.clone(), profile.target());
            Ok(())
        }

        async fn get(&self, _user_id: &str) -> DomainResult<Option<LearnerProfile>> {
            Ok(None)
        }
    }

    fn coordinator_with(
        generator: LadderGenerator,
        profiles: MapProfiles,
        settings: CoordinatorSettings,
    ) -> (SpeculationCoordinator, Arc<LadderGenerator>) {
        let generator = Arc::new(generator);
        let items = Arc::new(ItemAdapter::new(generator.clone(), SafetyFilter::permissive()));
        (
            SpeculationCoordinator::new(items, Arc::new(profiles), settings),
            generator,
        )
    }

    fn coordinator() -> (SpeculationCoordinator, Arc<LadderGenerator>) {
        coordinator_with(
            LadderGenerator::new(),
            MapProfiles::default(),
            CoordinatorSettings::default(),
        )
    }

    fn item_for(state: &AssessmentState) -> AssessmentItem {
        AssessmentItem {
            subject: state.subject.clone(),
            course: state.course.clone(),
            difficulty: state.difficulty,
            prompt: "q".to_string(),
            choices: vec!["a".to_string(), "b".to_string()],
            correct_index: 0,
            explanation: String::new(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_uses_configured_defaults() {
        let (coordinator, generator) = coordinator();
        let response = coordinator.next("u1", NextRequest::default()).await.unwrap();

        assert_eq!(response.state.subject, "Math");
        assert_eq!(response.state.course, "Algebra 1");
        assert_eq!(response.state.step, 1);
        assert_eq!(response.state.max_steps, 6);
        assert!(response.state.session_id.is_some());
        assert!(response.item.is_some());
        assert!(response.branches.is_some());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_prefers_profile_over_defaults() {
        let profiles = MapProfiles::default();
        profiles
            .upsert(&LearnerProfile::new("u1", SubjectCourse::new("Science", "Biology")))
            .await
            .unwrap();
        let (coordinator, _) =
            coordinator_with(LadderGenerator::new(), profiles, CoordinatorSettings::default());

        let response = coordinator.next("u1", NextRequest::default()).await.unwrap();
        assert_eq!(response.state.subject, "Science");

        let explicit = NextRequest::bootstrap(SubjectCourse::new("English", "Grammar"), vec![]);
        let response = coordinator.next("u1", explicit).await.unwrap();
        assert_eq!(response.state.subject, "English");
    }

    #[tokio::test]
    async fn test_bootstrap_profile_failure_is_distinct() {
        let profiles = MapProfiles {
            broken: true,
            ..Default::default()
        };
        let (coordinator, generator) =
            coordinator_with(LadderGenerator::new(), profiles, CoordinatorSettings::default());

        let err = coordinator.next("u1", NextRequest::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::ProfileUnavailable(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_branches_equal_advance() {
        let (coordinator, _) = coordinator();
        let first = coordinator.next("u1", NextRequest::default()).await.unwrap();
        let branches = first.branches.unwrap();

        assert_eq!(branches.right.state, advance(&first.state, true));
        assert_eq!(branches.wrong.state, advance(&first.state, false));
        assert_eq!(branches.right.item.unwrap().prompt, "step 2 at easy");
        assert_eq!(branches.wrong.item.unwrap().prompt, "step 2 at intro");
    }

    #[tokio::test]
    async fn test_answer_is_recomputed_server_side() {
        let (coordinator, _) = coordinator();
        let first = coordinator.next("u1", NextRequest::default()).await.unwrap();
        let item = first.item.clone().unwrap();

        let wrong = NextRequest::answered(first.state.clone(), 2, item.clone());
        let response = coordinator.next("u1", wrong).await.unwrap();
        assert_eq!(response.state, advance(&first.state, false));
        assert_eq!(response.state.mistakes, 1);

        let right = NextRequest::answered(first.state.clone(), item.correct_index, item);
        let response = coordinator.next("u1", right).await.unwrap();
        assert_eq!(response.state, advance(&first.state, true));
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_fail_others() {
        let generator = LadderGenerator {
            fail_at: vec![Difficulty::Intro],
            ..LadderGenerator::new()
        };
        let (coordinator, _) =
            coordinator_with(generator, MapProfiles::default(), CoordinatorSettings::default());

        let response = coordinator.next("u1", NextRequest::default()).await.unwrap();
        let branches = response.branches.unwrap();
        assert!(response.item.is_some());
        assert!(branches.right.item.is_some());
        assert!(branches.wrong.item.is_none());
        assert_eq!(branches.wrong.state.difficulty, Difficulty::Intro);
    }

    #[tokio::test]
    async fn test_terminal_state_skips_generation() {
        let (coordinator, generator) = coordinator();
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![],
        );
        state.step = 6;
        let item = item_for(&state);

        let response = coordinator
            .next("u1", NextRequest::answered(state, 0, item))
            .await
            .unwrap();
        assert!(response.state.done);
        assert!(response.item.is_none());
        assert!(response.branches.is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminal_branch_not_generated() {
        let (coordinator, generator) = coordinator();
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![],
        );
        state.step = 6;

        let response = coordinator.next("u1", NextRequest::resume(state)).await.unwrap();
        let branches = response.branches.unwrap();
        assert!(branches.right.state.done && branches.wrong.state.done);
        assert!(branches.right.is_ready());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answer_on_terminal_state_rejected() {
        let (coordinator, _) = coordinator();
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![],
        );
        state.step = 7;
        state.done = true;
        let item = item_for(&state);

        let err = coordinator
            .next("u1", NextRequest::answered(state, 0, item))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_validation_rejects_before_generation() {
        let (coordinator, generator) = coordinator();
        let state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![],
        );

        let half = NextRequest {
            state: Some(state.clone()),
            last_answer: Some(0),
            ..Default::default()
        };
        assert!(coordinator.next("u1", half).await.is_err());

        let mut foreign = item_for(&state);
        foreign.subject = "History".to_string();
        let mismatched = NextRequest::answered(state.clone(), 0, foreign);
        assert!(coordinator.next("u1", mismatched).await.is_err());

        let out_of_range = NextRequest::answered(state.clone(), 5, item_for(&state));
        assert!(coordinator.next("u1", out_of_range).await.is_err());

        let orphan = NextRequest {
            last_answer: Some(0),
            last_item: Some(item_for(&state)),
            ..Default::default()
        };
        assert!(coordinator.next("u1", orphan).await.is_err());

        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fan_in_timeout_is_distinct_error() {
        let generator = LadderGenerator {
            delay: Duration::from_millis(200),
            ..LadderGenerator::new()
        };
        let settings = CoordinatorSettings {
            fan_in_timeout: Duration::from_millis(20),
            ..CoordinatorSettings::default()
        };
        let (coordinator, _) = coordinator_with(generator, MapProfiles::default(), settings);

        let err = coordinator.next("u1", NextRequest::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::GenerationTimeout(_)));
    }

    #[tokio::test]
    async fn test_fan_out_is_concurrent() {
        let generator = LadderGenerator {
            delay: Duration::from_millis(150),
            ..LadderGenerator::new()
        };
        let settings = CoordinatorSettings {
            fan_in_timeout: Duration::from_millis(400),
            ..CoordinatorSettings::default()
        };
        let (coordinator, _) = coordinator_with(generator, MapProfiles::default(), settings);

        // Three sequential calls would need 450ms and blow the 400ms bound.
        let response = coordinator.next("u1", NextRequest::default()).await.unwrap();
        assert!(response.item.is_some());
    }
}
