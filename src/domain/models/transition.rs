//! The assessment state machine.
//!
//! [`advance`] is the only way an [`AssessmentState`] changes after bootstrap.
//! It is pure: the server recomputes it to stay authoritative, and the
//! speculation protocol relies on both sides computing identical branches.

use super::assessment::{AssessmentState, Difficulty};

/// Consecutive correct answers needed to climb one rung.
pub const PROMOTION_STREAK: u32 = 2;

/// Cumulative mistakes that end the session once the learner is at `hard`.
pub const HARD_MISTAKE_LIMIT: u32 = 2;

/// Advance `state` by one answered question.
///
/// Terminal states are fixed points and come back unchanged.
pub fn advance(state: &AssessmentState, correct: bool) -> AssessmentState {
    if state.done {
        return state.clone();
    }

    let mut next = state.clone();
    next.step = state.step.saturating_add(1);

    if correct {
        next.correct_streak = state.correct_streak + 1;
        if next.correct_streak >= PROMOTION_STREAK && state.difficulty != Difficulty::Hard {
            next.difficulty = state.difficulty.promote();
            next.correct_streak = 0;
        }
    } else {
        next.mistakes = state.mistakes + 1;
        next.correct_streak = 0;
        next.difficulty = state.difficulty.demote();
    }

    // A mistake answered at hard counts even though it demotes the learner.
    let at_hard = next.difficulty == Difficulty::Hard
        || (!correct && state.difficulty == Difficulty::Hard);
    next.done = next.step > next.max_steps || (next.mistakes >= HARD_MISTAKE_LIMIT && at_hard);

    next
}

/// Both hypothetical successors of `state`: `(right, wrong)`.
pub fn branch_states(state: &AssessmentState) -> (AssessmentState, AssessmentState) {
    (advance(state, true), advance(state, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::assessment::SubjectCourse;

    fn state_at(difficulty: Difficulty) -> AssessmentState {
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            difficulty,
            vec![],
        );
        state.session_id = None;
        state
    }

    #[test]
    fn test_two_correct_answers_promote() {
        let s1 = state_at(Difficulty::Easy);
        let s2 = advance(&s1, true);
        assert_eq!(s2.difficulty, Difficulty::Easy);
        assert_eq!(s2.correct_streak, 1);

        let s3 = advance(&s2, true);
        assert_eq!(s3.difficulty, Difficulty::Medium);
        assert_eq!(s3.correct_streak, 0);
        assert_eq!(s3.step, 3);
    }

    #[test]
    fn test_wrong_answer_demotes_and_resets_streak() {
        let mut state = state_at(Difficulty::Medium);
        state.correct_streak = 1;
        state.step = 2;

        let next = advance(&state, false);
        assert_eq!(next.difficulty, Difficulty::Easy);
        assert_eq!(next.correct_streak, 0);
        assert_eq!(next.mistakes, 1);
        assert!(!next.done);
    }

    #[test]
    fn test_wrong_answer_at_intro_stays_at_intro() {
        let state = state_at(Difficulty::Intro);
        let next = advance(&state, false);
        assert_eq!(next.difficulty, Difficulty::Intro);
        assert_eq!(next.mistakes, 1);
    }

    #[test]
    fn test_streak_keeps_growing_at_hard() {
        let mut state = state_at(Difficulty::Hard);
        state.correct_streak = 3;
        state.step = 4;
        let next = advance(&state, true);
        assert_eq!(next.difficulty, Difficulty::Hard);
        assert_eq!(next.correct_streak, 4);
    }

    #[test]
    fn test_step_limit_terminates() {
        let mut state = state_at(Difficulty::Easy);
        state.step = 6;
        let next = advance(&state, true);
        assert_eq!(next.step, 7);
        assert!(next.done);
    }

    #[test]
    fn test_second_mistake_at_hard_terminates() {
        let mut state = state_at(Difficulty::Hard);
        state.step = 3;
        state.mistakes = 1;
        state.max_steps = 20;

        let next = advance(&state, false);
        assert_eq!(next.difficulty, Difficulty::Medium);
        assert!(next.done, "second mistake made at hard ends the session");
    }

    #[test]
    fn test_promotion_into_hard_with_two_mistakes_terminates() {
        let mut state = state_at(Difficulty::Medium);
        state.step = 5;
        state.mistakes = 2;
        state.correct_streak = 1;
        state.max_steps = 20;

        let next = advance(&state, true);
        assert_eq!(next.difficulty, Difficulty::Hard);
        assert!(next.done);
    }

    #[test]
    fn test_done_state_is_fixed_point() {
        let mut state = state_at(Difficulty::Medium);
        state.step = 7;
        state.done = true;
        assert_eq!(advance(&state, true), state);
        assert_eq!(advance(&state, false), state);
    }

    #[test]
    fn test_branch_states_match_advance() {
        let state = state_at(Difficulty::Easy);
        let (right, wrong) = branch_states(&state);
        assert_eq!(right, advance(&state, true));
        assert_eq!(wrong, advance(&state, false));
    }

    #[test]
    fn test_session_id_and_remaining_carried() {
        let mut state = AssessmentState::new(
            SubjectCourse::new("Math", "Algebra 1"),
            6,
            Difficulty::Easy,
            vec![SubjectCourse::new("Science", "Biology")],
        );
        state.step = 2;
        let next = advance(&state, false);
        assert_eq!(next.session_id, state.session_id);
        assert_eq!(next.remaining, state.remaining);
        assert_eq!(next.subject, "Math");
    }
}
