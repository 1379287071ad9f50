// src/attempt/controller.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{exam::PublicExam, question::PublicQuestion, result::SubmittedAnswer};

use super::{
    AttemptScope,
    clock::Clock,
    order,
    store::AttemptStore,
    timer::PersistentTimer,
    violations::{BlockedAction, ViolationOutcome, ViolationSignal, ViolationTracker},
};

/// Explicit submission lifecycle. Every entry point (timer expiry,
/// violation trigger, manual finish) is gated by the single
/// `InProgress -> Submitting` transition, which is allowed exactly once
/// per in-flight submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Submitting,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimeExpired,
    ViolationLimit,
}

impl SubmitTrigger {
    pub fn is_automatic(&self) -> bool {
        !matches!(self, SubmitTrigger::Manual)
    }
}

/// The payload the embedding shell dispatches to the submission endpoint.
/// Answers are listed in displayed question order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub exam_id: Uuid,
    pub answers: Vec<SubmittedAnswer>,
    pub trigger: SubmitTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Manual finish was requested without a prior `confirm_finish`.
    ConfirmationRequired,
    AlreadySubmitting,
    AlreadyClosed,
}

/// Result of a 1-second tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running { seconds_left: u64 },
    /// The time limit just elapsed; dispatch this payload. Produced at
    /// most once per attempt.
    AutoSubmit(SubmissionRequest),
    /// Attempt is submitting or closed; ticks are ignored.
    Idle,
}

/// Result of feeding a proctoring signal through the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Ignored,
    Warning { count: u32, remaining: u32 },
    AutoSubmit(SubmissionRequest),
}

/// Where to send the student after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRoute {
    /// Route to the result review screen.
    Result(Uuid),
    /// Generic completion acknowledgment (exam hides results).
    Completed,
}

/// Recovery policy after a failed submission dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Manual submission failed: attempt reopens, user may retry with
    /// answers intact.
    RetryManual,
    /// Automatic submission failed: re-dispatch this payload after the
    /// backoff. The attempt stays in `Submitting`.
    RetryAuto {
        attempt: u32,
        backoff_secs: u64,
        request: SubmissionRequest,
    },
    /// Retry budget exhausted: reopen the attempt and surface a
    /// persistent error. Nothing is cleared.
    GiveUp,
}

/// Automatic submissions retry this many times before giving up.
pub const AUTO_RETRY_LIMIT: u32 = 3;

/// Orchestrates one proctored attempt: owns the answer map, the current
/// question pointer, and the submission lifecycle, and wires the timer,
/// order resolver and violation tracker to one attempt scope.
pub struct AttemptController<S, C> {
    scope: AttemptScope,
    exam: PublicExam,
    questions: Vec<PublicQuestion>,
    answers: HashMap<Uuid, usize>,
    current_index: usize,
    status: AttemptStatus,
    timer: PersistentTimer,
    tracker: ViolationTracker,
    fullscreen: bool,
    deadline_fired: bool,
    confirm_pending: bool,
    active_trigger: Option<SubmitTrigger>,
    auto_retries: u32,
    store: S,
    clock: C,
}

impl<S: AttemptStore, C: Clock> AttemptController<S, C> {
    /// Mounts an attempt: resolves the question order, loads (or starts)
    /// the persistent timer, and restores any accumulated violations.
    pub fn begin(
        store: S,
        clock: C,
        exam: PublicExam,
        questions: Vec<PublicQuestion>,
        attempt_key: impl Into<String>,
    ) -> Self {
        let scope = AttemptScope::new(exam.id, attempt_key);
        let questions =
            order::resolve_order(&store, &scope, questions, exam.randomize_questions);
        let limit = exam.time_limit_minutes.max(0) as u32;
        let timer = PersistentTimer::start(&store, &scope, limit, &clock);
        let tracker = ViolationTracker::load(&store, &scope, exam.security_enabled);
        // Security-enabled attempts start with content withheld until the
        // shell confirms fullscreen entry.
        let fullscreen = !exam.security_enabled;

        AttemptController {
            scope,
            exam,
            questions,
            answers: HashMap::new(),
            current_index: 0,
            status: AttemptStatus::InProgress,
            timer,
            tracker,
            fullscreen,
            deadline_fired: false,
            confirm_pending: false,
            active_trigger: None,
            auto_retries: 0,
            store,
            clock,
        }
    }

    // ------------------------------------------------------------------
    // Observable state for rendering (palette, timer display, overlay)
    // ------------------------------------------------------------------

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn time_left(&self) -> u64 {
        self.timer.remaining(&self.clock)
    }

    pub fn warning_count(&self) -> u32 {
        self.tracker.current_warning_count()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn questions(&self) -> &[PublicQuestion] {
        &self.questions
    }

    pub fn current_question(&self) -> Option<&PublicQuestion> {
        self.questions.get(self.current_index)
    }

    pub fn answers(&self) -> &HashMap<Uuid, usize> {
        &self.answers
    }

    /// False while security mode demands fullscreen and the client is
    /// not in it: question content must be withheld behind a blocking
    /// re-entry prompt. Leaving fullscreen itself is reported through
    /// `handle_signal`, which decides whether it counts.
    pub fn content_visible(&self) -> bool {
        !self.exam.security_enabled || self.fullscreen
    }

    pub fn set_fullscreen(&mut self, active: bool) {
        self.fullscreen = active;
    }

    // ------------------------------------------------------------------
    // User input
    // ------------------------------------------------------------------

    /// Records an answer. Rejected once submission has started, or when
    /// the question/option does not exist.
    pub fn select_option(&mut self, question_id: Uuid, option_index: usize) -> bool {
        if self.status != AttemptStatus::InProgress {
            return false;
        }
        let valid = self
            .questions
            .iter()
            .any(|q| q.id == question_id && option_index < q.options.len());
        if valid {
            self.answers.insert(question_id, option_index);
        }
        valid
    }

    pub fn clear_answer(&mut self, question_id: Uuid) {
        if self.status == AttemptStatus::InProgress {
            self.answers.remove(&question_id);
        }
    }

    pub fn go_to(&mut self, index: usize) {
        if self.status == AttemptStatus::InProgress && index < self.questions.len() {
            self.current_index = index;
        }
    }

    // ------------------------------------------------------------------
    // Timer and proctoring events
    // ------------------------------------------------------------------

    /// 1-second cadence. When the limit elapses, yields the automatic
    /// submission payload exactly once; later ticks are `Idle`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != AttemptStatus::InProgress {
            return TickOutcome::Idle;
        }
        let seconds_left = self.time_left();
        if seconds_left == 0 && !self.deadline_fired {
            self.deadline_fired = true;
            return match self.begin_submit(SubmitTrigger::TimeExpired) {
                Ok(request) => TickOutcome::AutoSubmit(request),
                Err(_) => TickOutcome::Idle,
            };
        }
        TickOutcome::Running { seconds_left }
    }

    /// Feeds a proctoring signal through the tracker. The third warning
    /// converts into a forced submission through the same path a manual
    /// finish uses.
    pub fn handle_signal(&mut self, signal: ViolationSignal) -> SignalOutcome {
        if self.status != AttemptStatus::InProgress {
            return SignalOutcome::Ignored;
        }
        match self.tracker.observe(&self.store, &self.scope, signal) {
            ViolationOutcome::Ignored => SignalOutcome::Ignored,
            ViolationOutcome::Warning { count, remaining } => {
                SignalOutcome::Warning { count, remaining }
            }
            ViolationOutcome::ForceSubmit { .. } => {
                match self.begin_submit(SubmitTrigger::ViolationLimit) {
                    Ok(request) => SignalOutcome::AutoSubmit(request),
                    Err(_) => SignalOutcome::Ignored,
                }
            }
        }
    }

    /// Whether the shell should neutralize a blocked action (context
    /// menu, key chord, back navigation). Never affects the counter.
    pub fn should_block(&self, action: BlockedAction) -> bool {
        self.tracker.blocks(action)
    }

    // ------------------------------------------------------------------
    // Submission lifecycle
    // ------------------------------------------------------------------

    /// Marks the user's confirmation of a manual finish. The next
    /// `begin_submit(Manual)` will proceed.
    pub fn confirm_finish(&mut self) {
        if self.status == AttemptStatus::InProgress {
            self.confirm_pending = true;
        }
    }

    /// The single `InProgress -> Submitting` transition. Concurrent
    /// triggers (timer expiry racing a violation or a click) get an
    /// error instead of a second payload.
    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> Result<SubmissionRequest, SubmitError> {
        match self.status {
            AttemptStatus::Submitting => Err(SubmitError::AlreadySubmitting),
            AttemptStatus::Closed => Err(SubmitError::AlreadyClosed),
            AttemptStatus::InProgress => {
                if trigger == SubmitTrigger::Manual && !self.confirm_pending {
                    return Err(SubmitError::ConfirmationRequired);
                }
                self.confirm_pending = false;
                self.status = AttemptStatus::Submitting;
                self.active_trigger = Some(trigger);
                self.auto_retries = 0;
                self.tracker.freeze();
                Ok(self.build_request(trigger))
            }
        }
    }

    /// Successful grading response: the attempt is closed, the per-scope
    /// timer/warning/order records are cleared as a unit, and fullscreen
    /// is released.
    pub fn complete_submit(&mut self, result_id: Uuid) -> CompletionRoute {
        self.status = AttemptStatus::Closed;
        self.active_trigger = None;
        self.store.clear_scope(&self.scope);
        self.fullscreen = false;
        if self.exam.show_result {
            CompletionRoute::Result(result_id)
        } else {
            CompletionRoute::Completed
        }
    }

    /// Failed dispatch. Manual submissions reopen immediately for a
    /// user-driven retry; automatic submissions are retried with
    /// doubling backoff up to [`AUTO_RETRY_LIMIT`] times before the
    /// attempt reopens with a persistent error. Attempt state is never
    /// cleared on failure.
    pub fn fail_submit(&mut self) -> RetryDecision {
        let trigger = match self.active_trigger {
            Some(t) => t,
            None => return RetryDecision::RetryManual,
        };

        if trigger.is_automatic() {
            self.auto_retries += 1;
            if self.auto_retries <= AUTO_RETRY_LIMIT {
                return RetryDecision::RetryAuto {
                    attempt: self.auto_retries,
                    backoff_secs: 1u64 << (self.auto_retries - 1),
                    request: self.build_request(trigger),
                };
            }
            tracing::error!(
                "Automatic submission failed after {} retries, reopening attempt",
                AUTO_RETRY_LIMIT
            );
            self.reopen();
            return RetryDecision::GiveUp;
        }

        self.reopen();
        RetryDecision::RetryManual
    }

    fn reopen(&mut self) {
        self.status = AttemptStatus::InProgress;
        self.active_trigger = None;
        self.auto_retries = 0;
        self.tracker.unfreeze();
    }

    fn build_request(&self, trigger: SubmitTrigger) -> SubmissionRequest {
        let answers = self
            .questions
            .iter()
            .filter_map(|q| {
                self.answers.get(&q.id).map(|&idx| SubmittedAnswer {
                    question_id: q.id,
                    selected_index: idx as i32,
                })
            })
            .collect();
        SubmissionRequest {
            exam_id: self.exam.id,
            answers,
            trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::clock::ManualClock;
    use crate::attempt::store::MemoryStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn exam(security_enabled: bool, randomize: bool, show_result: bool) -> PublicExam {
        PublicExam {
            id: Uuid::new_v4(),
            title: "Computer GK Unit Test".to_string(),
            description: "Covers unit 3".to_string(),
            time_limit_minutes: 10,
            start_time: None,
            end_time: None,
            show_result,
            randomize_questions: randomize,
            security_enabled,
            has_security_key: false,
            category: "Computer GK".to_string(),
        }
    }

    fn questions(n: usize) -> Vec<PublicQuestion> {
        (0..n)
            .map(|i| PublicQuestion {
                id: Uuid::new_v4(),
                text: format!("Question {}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            })
            .collect()
    }

    fn controller(
        security: bool,
    ) -> AttemptController<Arc<MemoryStore>, Arc<ManualClock>> {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        AttemptController::begin(store, clock, exam(security, false, true), questions(3), "R-001")
    }

    #[test]
    fn select_clear_and_navigate() {
        let mut ctrl = controller(false);
        let q0 = ctrl.questions()[0].id;
        let q1 = ctrl.questions()[1].id;

        assert!(ctrl.select_option(q0, 1));
        assert!(ctrl.select_option(q1, 0));
        assert!(!ctrl.select_option(q0, 9)); // option out of range
        assert!(!ctrl.select_option(Uuid::new_v4(), 0)); // unknown question
        assert_eq!(ctrl.answers().len(), 2);

        ctrl.clear_answer(q1);
        assert_eq!(ctrl.answers().len(), 1);

        ctrl.go_to(2);
        assert_eq!(ctrl.current_index(), 2);
        ctrl.go_to(99);
        assert_eq!(ctrl.current_index(), 2);
    }

    #[test]
    fn manual_submit_requires_confirmation() {
        let mut ctrl = controller(false);
        assert_eq!(
            ctrl.begin_submit(SubmitTrigger::Manual),
            Err(SubmitError::ConfirmationRequired)
        );
        ctrl.confirm_finish();
        assert!(ctrl.begin_submit(SubmitTrigger::Manual).is_ok());
        assert_eq!(ctrl.status(), AttemptStatus::Submitting);
    }

    #[test]
    fn concurrent_triggers_yield_exactly_one_payload() {
        let mut ctrl = controller(false);
        // Timer expiry racing a manual click.
        let first = ctrl.begin_submit(SubmitTrigger::TimeExpired);
        assert!(first.is_ok());
        assert_eq!(
            ctrl.begin_submit(SubmitTrigger::ViolationLimit),
            Err(SubmitError::AlreadySubmitting)
        );
        ctrl.confirm_finish();
        assert_eq!(
            ctrl.begin_submit(SubmitTrigger::Manual),
            Err(SubmitError::AlreadySubmitting)
        );
    }

    #[test]
    fn tick_fires_auto_submit_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut ctrl = AttemptController::begin(
            store,
            Arc::clone(&clock),
            exam(false, false, true),
            questions(3),
            "R-001",
        );

        assert_eq!(ctrl.tick(), TickOutcome::Running { seconds_left: 600 });
        clock.advance(Duration::seconds(600));
        assert!(matches!(ctrl.tick(), TickOutcome::AutoSubmit(_)));
        assert_eq!(ctrl.tick(), TickOutcome::Idle);
    }

    #[test]
    fn input_is_rejected_once_submitting() {
        let mut ctrl = controller(false);
        let q0 = ctrl.questions()[0].id;
        ctrl.select_option(q0, 1);
        ctrl.begin_submit(SubmitTrigger::TimeExpired).unwrap();

        assert!(!ctrl.select_option(q0, 2));
        ctrl.clear_answer(q0);
        assert_eq!(ctrl.answers().len(), 1);
        ctrl.go_to(2);
        assert_eq!(ctrl.current_index(), 0);
        assert_eq!(
            ctrl.handle_signal(ViolationSignal::FocusLost),
            SignalOutcome::Ignored
        );
    }

    #[test]
    fn completion_clears_scope_and_routes() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut ctrl = AttemptController::begin(
            Arc::clone(&store),
            clock,
            exam(true, false, true),
            questions(3),
            "R-001",
        );
        ctrl.handle_signal(ViolationSignal::FocusLost);
        ctrl.confirm_finish();
        ctrl.begin_submit(SubmitTrigger::Manual).unwrap();

        let result_id = Uuid::new_v4();
        assert_eq!(
            ctrl.complete_submit(result_id),
            CompletionRoute::Result(result_id)
        );
        assert_eq!(ctrl.status(), AttemptStatus::Closed);

        let scope = AttemptScope::new(ctrl.exam.id, "R-001");
        for field in crate::attempt::store::Field::ALL {
            assert_eq!(store.get(&scope, field), None);
        }
    }

    #[test]
    fn hidden_result_routes_to_completion_ack() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut ctrl = AttemptController::begin(
            store,
            clock,
            exam(false, false, false),
            questions(3),
            "R-001",
        );
        ctrl.confirm_finish();
        ctrl.begin_submit(SubmitTrigger::Manual).unwrap();
        assert_eq!(
            ctrl.complete_submit(Uuid::new_v4()),
            CompletionRoute::Completed
        );
    }

    #[test]
    fn manual_failure_reopens_with_state_intact() {
        let mut ctrl = controller(false);
        let q0 = ctrl.questions()[0].id;
        ctrl.select_option(q0, 1);
        ctrl.confirm_finish();
        ctrl.begin_submit(SubmitTrigger::Manual).unwrap();

        assert_eq!(ctrl.fail_submit(), RetryDecision::RetryManual);
        assert_eq!(ctrl.status(), AttemptStatus::InProgress);
        assert_eq!(ctrl.answers().len(), 1);
    }

    #[test]
    fn auto_failure_retries_with_backoff_then_gives_up() {
        let mut ctrl = controller(false);
        let request = ctrl.begin_submit(SubmitTrigger::TimeExpired).unwrap();

        for attempt in 1..=AUTO_RETRY_LIMIT {
            match ctrl.fail_submit() {
                RetryDecision::RetryAuto {
                    attempt: a,
                    backoff_secs,
                    request: retry,
                } => {
                    assert_eq!(a, attempt);
                    assert_eq!(backoff_secs, 1u64 << (attempt - 1));
                    assert_eq!(retry, request);
                }
                other => panic!("expected RetryAuto, got {:?}", other),
            }
            assert_eq!(ctrl.status(), AttemptStatus::Submitting);
        }

        assert_eq!(ctrl.fail_submit(), RetryDecision::GiveUp);
        assert_eq!(ctrl.status(), AttemptStatus::InProgress);
    }

    #[test]
    fn third_violation_forces_submission() {
        let mut ctrl = controller(true);
        assert_eq!(
            ctrl.handle_signal(ViolationSignal::FocusLost),
            SignalOutcome::Warning {
                count: 1,
                remaining: 2
            }
        );
        assert_eq!(
            ctrl.handle_signal(ViolationSignal::FocusLost),
            SignalOutcome::Warning {
                count: 2,
                remaining: 1
            }
        );
        match ctrl.handle_signal(ViolationSignal::FocusLost) {
            SignalOutcome::AutoSubmit(request) => {
                assert_eq!(request.trigger, SubmitTrigger::ViolationLimit);
            }
            other => panic!("expected AutoSubmit, got {:?}", other),
        }
        assert_eq!(ctrl.status(), AttemptStatus::Submitting);
    }

    #[test]
    fn fullscreen_gate_withholds_content() {
        // Content stays hidden from mount until the shell reports that
        // fullscreen was actually entered.
        let mut ctrl = controller(true);
        assert!(!ctrl.content_visible());
        ctrl.set_fullscreen(true);
        assert!(ctrl.content_visible());
        ctrl.set_fullscreen(false);
        assert!(!ctrl.content_visible());

        // Without security the gate never engages.
        let mut open = controller(false);
        assert!(open.content_visible());
        open.set_fullscreen(false);
        assert!(open.content_visible());
    }

    #[test]
    fn payload_lists_answers_in_display_order() {
        let mut ctrl = controller(false);
        let ids: Vec<Uuid> = ctrl.questions().iter().map(|q| q.id).collect();
        ctrl.select_option(ids[2], 3);
        ctrl.select_option(ids[0], 1);
        ctrl.confirm_finish();

        let request = ctrl.begin_submit(SubmitTrigger::Manual).unwrap();
        assert_eq!(request.answers.len(), 2);
        assert_eq!(request.answers[0].question_id, ids[0]);
        assert_eq!(request.answers[1].question_id, ids[2]);
    }
}
