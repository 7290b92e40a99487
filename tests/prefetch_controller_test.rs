//! Prefetch controller driven against the real engine in-process.

mod common;

use adaptive_assessor::client::{
    AssessmentTransport, BranchReadiness, InProcessTransport, PrefetchController, ProceedOutcome,
    SessionSummary,
};
use adaptive_assessor::domain::models::{NextRequest, SubjectCourse};
use adaptive_assessor::domain::ports::AttemptRepository;
use common::test_engine;
use std::sync::Arc;

/// Answer every question correctly, waiting for branches before each answer.
async fn play_all_correct<T: AssessmentTransport + ?Sized>(
    controller: &mut PrefetchController<T>,
) -> (SessionSummary, usize) {
    let mut optimistic = 0;
    loop {
        assert!(controller.wait_for_branches().await, "prefetch should deliver branches");
        let answer = controller.current_item().expect("live state has an item").correct_index;
        assert_eq!(controller.select_answer(answer).unwrap(), BranchReadiness::Ready);

        match controller.proceed().await.unwrap() {
            ProceedOutcome::Advanced { optimistic: true } => optimistic += 1,
            ProceedOutcome::Advanced { optimistic: false } => panic!("branch was ready"),
            ProceedOutcome::Finished(summary) => return (summary, optimistic + 1),
        }
    }
}

#[tokio::test]
async fn test_full_session_advances_optimistically() {
    let engine = test_engine().await;
    let transport = Arc::new(InProcessTransport::new(
        engine.coordinator.clone(),
        engine.finalizer.clone(),
        "ada",
    ));
    let mut controller = PrefetchController::new(transport);

    controller.start(NextRequest::default()).await.unwrap();
    let (summary, answered) = play_all_correct(&mut controller).await;
    controller.flush().await;

    assert_eq!(answered, 6);
    assert_eq!((summary.correct_total, summary.question_total), (6, 6));
    assert!((summary.accuracy - 1.0).abs() < f64::EPSILON);
    assert!(summary.state.done);
    assert!(controller.is_finalized());

    let attempts = engine.attempts.list_for_user("ada", 10).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].correct_total, 6);
    assert_eq!(attempts[0].steps_taken, 6);
}

#[tokio::test]
async fn test_flow_moves_through_queued_subjects() {
    let engine = test_engine().await;
    let transport = Arc::new(InProcessTransport::new(
        engine.coordinator.clone(),
        engine.finalizer.clone(),
        "grace",
    ));
    let mut controller = PrefetchController::new(transport);

    let first = NextRequest::bootstrap(
        SubjectCourse::new("Math", "Algebra 1"),
        vec![SubjectCourse::new("Science", "Biology")],
    );
    controller.start(first).await.unwrap();
    play_all_correct(&mut controller).await;
    controller.flush().await;

    let second = controller.next_flow_request().expect("Science is queued");
    assert_eq!(second.subject.as_deref(), Some("Science"));
    controller.start(second).await.unwrap();
    assert_eq!(controller.current_state().unwrap().subject, "Science");
    play_all_correct(&mut controller).await;
    controller.flush().await;

    assert!(controller.next_flow_request().is_none());
    let attempts = engine.attempts.list_for_user("grace", 10).await.unwrap();
    assert_eq!(attempts.len(), 2);
}

#[tokio::test]
async fn test_early_finish_is_recorded_once() {
    let engine = test_engine().await;
    let transport = Arc::new(InProcessTransport::new(
        engine.coordinator.clone(),
        engine.finalizer.clone(),
        "quitter",
    ));
    let mut controller = PrefetchController::new(transport.clone());

    controller.start(NextRequest::default()).await.unwrap();
    let answer = controller.current_item().unwrap().correct_index;
    controller.select_answer(answer).unwrap();
    controller.proceed().await.unwrap();

    let summary = controller.finish().unwrap();
    assert_eq!(controller.finish().unwrap(), summary);
    controller.flush().await;

    // A client that resends the same finish does not create a second record.
    transport
        .finish(adaptive_assessor::FinishRequest {
            state: summary.state.clone(),
            correct_total: summary.correct_total,
            question_total: summary.question_total,
        })
        .await
        .unwrap();

    let attempts = engine.attempts.list_for_user("quitter", 10).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].question_total, 1);
    assert!(!attempts[0].attempt_key.is_empty());
}
