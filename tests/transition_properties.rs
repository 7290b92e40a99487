use adaptive_assessor::domain::models::{advance, branch_states, AssessmentState, Difficulty, SubjectCourse};
use proptest::prelude::*;

fn difficulty() -> impl Strategy<Value = Difficulty> {
    prop::sample::select(Difficulty::LADDER.to_vec())
}

fn fresh(max_steps: u32, start: Difficulty) -> AssessmentState {
    AssessmentState::new(SubjectCourse::new("Math", "Algebra 1"), max_steps, start, vec![])
}

/// Every state visited while answering `answers` in order, starting state first.
fn walk(start: AssessmentState, answers: &[bool]) -> Vec<AssessmentState> {
    let mut states = vec![start];
    for &correct in answers {
        let next = advance(states.last().unwrap(), correct);
        states.push(next);
    }
    states
}

proptest! {
    /// Property: every reachable state passes validation
    #[test]
    fn prop_reachable_states_are_valid(
        max_steps in 1u32..12,
        start in difficulty(),
        answers in prop::collection::vec(any::<bool>(), 0..20),
    ) {
        for state in walk(fresh(max_steps, start), &answers) {
            prop_assert!(state.validate().is_ok(), "invalid state: {:?}", state);
        }
    }

    /// Property: a live state advances by exactly one step and at most one rung
    #[test]
    fn prop_single_step_single_rung(
        max_steps in 1u32..12,
        start in difficulty(),
        answers in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        let states = walk(fresh(max_steps, start), &answers);
        for (pair, &correct) in states.windows(2).zip(&answers) {
            let (before, after) = (&pair[0], &pair[1]);
            if before.done {
                prop_assert_eq!(before, after);
                continue;
            }
            prop_assert_eq!(after.step, before.step + 1);
            let delta = i16::from(after.difficulty.rung()) - i16::from(before.difficulty.rung());
            prop_assert!(delta.abs() <= 1);
            if correct {
                prop_assert!(delta >= 0);
                prop_assert_eq!(after.mistakes, before.mistakes);
            } else {
                prop_assert!(delta <= 0);
                prop_assert_eq!(after.mistakes, before.mistakes + 1);
                prop_assert_eq!(after.correct_streak, 0);
            }
        }
    }

    /// Property: no session outlives its step budget
    #[test]
    fn prop_terminates_within_max_steps(
        max_steps in 1u32..12,
        start in difficulty(),
        answers in prop::collection::vec(any::<bool>(), 12..13),
    ) {
        let states = walk(fresh(max_steps, start), &answers);
        let done_at = states.iter().position(|s| s.done);
        prop_assert!(done_at.is_some());
        prop_assert!(done_at.unwrap() <= max_steps as usize);
    }

    /// Property: branches are exactly the two successors
    #[test]
    fn prop_branches_match_advance(
        max_steps in 1u32..12,
        start in difficulty(),
        answers in prop::collection::vec(any::<bool>(), 0..12),
    ) {
        for state in walk(fresh(max_steps, start), &answers) {
            let (right, wrong) = branch_states(&state);
            prop_assert_eq!(right, advance(&state, true));
            prop_assert_eq!(wrong, advance(&state, false));
        }
    }

    /// Property: the flow queue and session id survive every transition
    #[test]
    fn prop_identity_is_preserved(
        answers in prop::collection::vec(any::<bool>(), 0..12),
    ) {
        let mut start = fresh(6, Difficulty::Easy);
        start.remaining = vec![SubjectCourse::new("Science", "Biology")];
        let states = walk(start.clone(), &answers);
        for state in &states {
            prop_assert_eq!(&state.session_id, &start.session_id);
            prop_assert_eq!(&state.remaining, &start.remaining);
            prop_assert_eq!(&state.subject, &start.subject);
        }
    }
}

#[test]
fn test_two_mistakes_at_hard_end_the_session() {
    let start = fresh(10, Difficulty::Hard);
    let states = walk(start, &[false, true, true, false]);
    // wrong at hard, climb back to hard, wrong at hard
    assert!(!states[3].done);
    assert_eq!(states[3].difficulty, Difficulty::Hard);
    assert!(states[4].done);
    assert_eq!(states[4].mistakes, 2);
}
