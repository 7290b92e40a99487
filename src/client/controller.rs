//! Client prefetch controller.
//!
//! Drives one learner through a session against an [`AssessmentTransport`].
//! Every `next` response carries the items for both possible outcomes of
//! the current question, so when the learner proceeds the controller can
//! usually show the next question immediately and fetch the following
//! turn's branches in the background.
//!
//! Only one background prefetch is meaningful at a time. A superseded
//! prefetch is cancelled through its [`CancellationToken`], and a result
//! that still arrives is dropped unless its [`SpeculationKey`] matches the
//! one in flight.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{AssessmentTransport, ClientError};
use crate::domain::models::{
    accuracy, AssessmentItem, AssessmentState, Branches, FinishRequest, NextRequest, NextResponse,
    SpeculationKey, NEUTRAL_ACCURACY,
};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("No session has been started")]
    NotStarted,

    #[error("The current question is not available; reload it")]
    NoCurrentItem,

    #[error("Select an answer before proceeding")]
    NoPendingAnswer,

    #[error("Answer {answer} is out of range for {choices} choices")]
    AnswerOutOfRange { answer: usize, choices: usize },

    #[error("An advance is already in progress")]
    AdvanceInProgress,

    #[error("The session is finished")]
    SessionFinished,

    #[error(transparent)]
    Transport(#[from] ClientError),
}

/// Whether the branch for the selected answer can be shown without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchReadiness {
    Ready,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProceedOutcome {
    /// Moved to the next question; `optimistic` when no request was awaited.
    Advanced { optimistic: bool },
    /// Reached a terminal state and finalized the session.
    Finished(SessionSummary),
}

/// Local result of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub state: AssessmentState,
    pub correct_total: u32,
    pub question_total: u32,
    pub accuracy: f64,
}

type PrefetchResult = (SpeculationKey, Result<NextResponse, ClientError>);

/// A synchronous advance that outlives a dropped `proceed` future.
struct PendingAdvance {
    handle: JoinHandle<Result<NextResponse, ClientError>>,
    correct: bool,
}

pub struct PrefetchController<T: AssessmentTransport + ?Sized> {
    transport: Arc<T>,

    current_state: Option<AssessmentState>,
    current_item: Option<AssessmentItem>,
    branches: Option<Branches>,
    pending_answer: Option<usize>,

    in_flight_key: Option<SpeculationKey>,
    in_flight_cancel: Option<CancellationToken>,
    results_tx: mpsc::UnboundedSender<PrefetchResult>,
    results_rx: mpsc::UnboundedReceiver<PrefetchResult>,

    advancing: bool,
    sync_advance: Option<PendingAdvance>,

    finalized: bool,
    summary: Option<SessionSummary>,
    finish_job: Option<JoinHandle<()>>,

    correct_total: u32,
    question_total: u32,
}

impl<T: AssessmentTransport + ?Sized> PrefetchController<T> {
    pub fn new(transport: Arc<T>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            current_state: None,
            current_item: None,
            branches: None,
            pending_answer: None,
            in_flight_key: None,
            in_flight_cancel: None,
            results_tx,
            results_rx,
            advancing: false,
            sync_advance: None,
            finalized: false,
            summary: None,
            finish_job: None,
            correct_total: 0,
            question_total: 0,
        }
    }

    pub fn current_state(&self) -> Option<&AssessmentState> {
        self.current_state.as_ref()
    }

    pub fn current_item(&self) -> Option<&AssessmentItem> {
        self.current_item.as_ref()
    }

    pub fn branches(&self) -> Option<&Branches> {
        self.branches.as_ref()
    }

    pub fn pending_answer(&self) -> Option<usize> {
        self.pending_answer
    }

    pub fn in_flight_key(&self) -> Option<&SpeculationKey> {
        self.in_flight_key.as_ref()
    }

    pub fn is_advancing(&self) -> bool {
        self.advancing
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// `(correct, answered)` so far.
    pub fn totals(&self) -> (u32, u32) {
        (self.correct_total, self.question_total)
    }

    /// Begin a session, discarding any previous one.
    pub async fn start(&mut self, request: NextRequest) -> Result<(), ControllerError> {
        if self.advancing {
            return Err(ControllerError::AdvanceInProgress);
        }
        self.cancel_prefetch();
        let response = self.transport.next(request).await?;

        self.finalized = false;
        self.summary = None;
        self.pending_answer = None;
        self.correct_total = 0;
        self.question_total = 0;
        self.apply_response(response);

        info!(
            subject = ?self.current_state.as_ref().map(|s| s.subject.as_str()),
            "assessment session started"
        );
        self.finish_if_done();
        Ok(())
    }

    /// Record the learner's choice and report whether its branch is ready.
    pub fn select_answer(&mut self, answer: usize) -> Result<BranchReadiness, ControllerError> {
        self.ensure_live()?;
        if self.advancing {
            return Err(ControllerError::AdvanceInProgress);
        }
        let item = self.current_item.as_ref().ok_or(ControllerError::NoCurrentItem)?;
        if answer >= item.choices.len() {
            return Err(ControllerError::AnswerOutOfRange {
                answer,
                choices: item.choices.len(),
            });
        }
        let correct = item.is_correct(answer);

        self.pending_answer = Some(answer);
        self.drain_prefetch_results();

        Ok(self.readiness(correct))
    }

    fn readiness(&self, correct: bool) -> BranchReadiness {
        match &self.branches {
            Some(branches) if branches.for_outcome(correct).is_ready() => BranchReadiness::Ready,
            _ => BranchReadiness::Missing,
        }
    }

    /// Advance past the current question using the pending answer.
    ///
    /// With a ready branch this returns without awaiting the transport.
    /// Otherwise any prefetch is cancelled and a synchronous request is
    /// awaited. If this future is dropped during that request, the next call
    /// resumes it rather than sending another.
    pub async fn proceed(&mut self) -> Result<ProceedOutcome, ControllerError> {
        if self.sync_advance.is_some() {
            return self.complete_sync_advance().await;
        }
        if self.advancing {
            return Err(ControllerError::AdvanceInProgress);
        }
        self.ensure_live()?;
        let answer = self.pending_answer.ok_or(ControllerError::NoPendingAnswer)?;
        let (state, item) = match (&self.current_state, &self.current_item) {
            (Some(state), Some(item)) => (state.clone(), item.clone()),
            (None, _) => return Err(ControllerError::NotStarted),
            (Some(_), None) => return Err(ControllerError::NoCurrentItem),
        };
        let correct = item.is_correct(answer);

        self.drain_prefetch_results();

        if self.readiness(correct) == BranchReadiness::Ready {
            if let Some(branches) = self.branches.take() {
                let branch = if correct { branches.right } else { branches.wrong };
                self.record_answer(correct);
                self.pending_answer = None;
                self.current_state = Some(branch.state);
                self.current_item = branch.item;

                debug!(step = state.step, correct, "optimistic advance");
                if let Some(summary) = self.finish_if_done() {
                    return Ok(ProceedOutcome::Finished(summary));
                }

                let key = SpeculationKey::new(&state, answer);
                self.spawn_prefetch(key, NextRequest::answered(state, answer, item));
                return Ok(ProceedOutcome::Advanced { optimistic: true });
            }
        }

        self.cancel_prefetch();
        self.advancing = true;
        let transport = Arc::clone(&self.transport);
        let request = NextRequest::answered(state, answer, item);
        self.sync_advance = Some(PendingAdvance {
            handle: tokio::spawn(async move { transport.next(request).await }),
            correct,
        });
        debug!(correct, "branch missing; advancing synchronously");
        self.complete_sync_advance().await
    }

    async fn complete_sync_advance(&mut self) -> Result<ProceedOutcome, ControllerError> {
        let joined = match self.sync_advance.as_mut() {
            Some(pending) => (&mut pending.handle).await,
            None => return Err(ControllerError::NoPendingAnswer),
        };
        let correct = self.sync_advance.take().is_some_and(|p| p.correct);
        self.advancing = false;

        let response = joined
            .map_err(|e| ClientError::Transport(format!("advance task failed: {e}")))??;

        self.record_answer(correct);
        self.pending_answer = None;
        self.apply_response(response);

        match self.finish_if_done() {
            Some(summary) => Ok(ProceedOutcome::Finished(summary)),
            None => Ok(ProceedOutcome::Advanced { optimistic: false }),
        }
    }

    /// Reissue the last known state to recover a missing question.
    ///
    /// A question already on screen is kept along with its branches.
    pub async fn reload(&mut self) -> Result<(), ControllerError> {
        self.ensure_live()?;
        if self.advancing {
            return Err(ControllerError::AdvanceInProgress);
        }
        if self.current_item.is_some() {
            return Ok(());
        }
        let state = self.current_state.clone().ok_or(ControllerError::NotStarted)?;

        self.cancel_prefetch();
        let response = self.transport.next(NextRequest::resume(state)).await?;
        self.apply_response(response);
        self.finish_if_done();
        Ok(())
    }

    /// Apply every prefetch result that has already arrived.
    pub fn drain_prefetch_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((key, result)) = self.results_rx.try_recv() {
            if self.apply_prefetch(key, result) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the in-flight prefetch, if any. Returns whether branches are
    /// now available.
    pub async fn wait_for_branches(&mut self) -> bool {
        while self.in_flight_key.is_some() {
            match self.results_rx.recv().await {
                Some((key, result)) => {
                    self.apply_prefetch(key, result);
                }
                None => break,
            }
        }
        self.branches.is_some()
    }

    fn spawn_prefetch(&mut self, key: SpeculationKey, request: NextRequest) {
        self.cancel_prefetch();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let transport = Arc::clone(&self.transport);
        let tx = self.results_tx.clone();
        let task_key = key.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {
                    debug!(key = %task_key, "prefetch cancelled");
                }
                result = transport.next(request) => {
                    // The controller may be gone; nothing to deliver to then.
                    let _ = tx.send((task_key, result));
                }
            }
        });

        debug!(key = %key, "prefetch started");
        self.in_flight_key = Some(key);
        self.in_flight_cancel = Some(token);
    }

    fn cancel_prefetch(&mut self) {
        if let Some(token) = self.in_flight_cancel.take() {
            token.cancel();
        }
        self.in_flight_key = None;
    }

    /// Returns whether the result was applied.
    fn apply_prefetch(&mut self, key: SpeculationKey, result: Result<NextResponse, ClientError>) -> bool {
        if self.in_flight_key.as_ref() != Some(&key) {
            debug!(key = %key, "discarding stale prefetch");
            return false;
        }
        self.in_flight_key = None;
        self.in_flight_cancel = None;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e, "prefetch failed");
                return false;
            }
        };

        if self.current_state.as_ref() != Some(&response.state) {
            warn!(key = %key, "prefetch state diverged from local state; ignoring");
            return false;
        }
        // The question on screen stays; only a missing one is filled in.
        if self.current_item.is_none() {
            self.current_item = response.item;
        }
        self.branches = response.branches;
        true
    }

    fn apply_response(&mut self, response: NextResponse) {
        self.current_state = Some(response.state);
        self.current_item = response.item;
        self.branches = response.branches;
    }

    fn record_answer(&mut self, correct: bool) {
        self.question_total += 1;
        if correct {
            self.correct_total += 1;
        }
    }

    fn ensure_live(&self) -> Result<(), ControllerError> {
        if self.finalized {
            return Err(ControllerError::SessionFinished);
        }
        if self.current_state.is_none() {
            return Err(ControllerError::NotStarted);
        }
        Ok(())
    }

    fn finish_if_done(&mut self) -> Option<SessionSummary> {
        if self.current_state.as_ref().is_some_and(|s| s.done) {
            self.finish().ok()
        } else {
            None
        }
    }

    /// Finalize the session, at most once.
    ///
    /// The finish request is sent in the background; its failure is logged.
    /// Later calls return the same summary without sending anything.
    pub fn finish(&mut self) -> Result<SessionSummary, ControllerError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }
        let state = self.current_state.clone().ok_or(ControllerError::NotStarted)?;

        self.finalized = true;
        self.cancel_prefetch();
        self.branches = None;
        self.pending_answer = None;

        let summary = SessionSummary {
            state: state.clone(),
            correct_total: self.correct_total,
            question_total: self.question_total,
            accuracy: accuracy(self.correct_total, self.question_total, NEUTRAL_ACCURACY),
        };
        self.summary = Some(summary.clone());

        let request = FinishRequest {
            state,
            correct_total: self.correct_total,
            question_total: self.question_total,
        };
        let transport = Arc::clone(&self.transport);
        self.finish_job = Some(tokio::spawn(async move {
            if let Err(e) = transport.finish(request).await {
                warn!(error = %e, "failed to submit finished session");
            }
        }));

        info!(
            correct = summary.correct_total,
            answered = summary.question_total,
            accuracy = summary.accuracy,
            "assessment session finished"
        );
        Ok(summary)
    }

    /// Wait for the background finish request to complete.
    pub async fn flush(&mut self) {
        if let Some(job) = self.finish_job.take() {
            if let Err(e) = job.await {
                warn!(error = %e, "finish task failed");
            }
        }
    }

    /// Bootstrap request for the next subject in the session's flow.
    pub fn next_flow_request(&self) -> Option<NextRequest> {
        if !self.finalized {
            return None;
        }
        let (target, rest) = self.current_state.as_ref()?.next_in_flow()?;
        Some(NextRequest::bootstrap(target, rest))
    }
}

impl<T: AssessmentTransport + ?Sized> Drop for PrefetchController<T> {
    fn drop(&mut self) {
        self.cancel_prefetch();
    }
}
