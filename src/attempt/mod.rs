// src/attempt/mod.rs
//
// The proctored attempt session engine. Everything here is deterministic
// library code driven by an injected clock and attempt store: the
// embedding client (a browser shell, a desktop kiosk, a simulation in
// tests) feeds it ticks, proctoring signals and user input, and performs
// the actual network dispatch for the payloads it produces.

pub mod clock;
pub mod controller;
pub mod order;
pub mod store;
pub mod timer;
pub mod violations;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    AttemptController, AttemptStatus, CompletionRoute, RetryDecision, SignalOutcome, SubmitError,
    SubmitTrigger, SubmissionRequest, TickOutcome,
};
pub use store::{AttemptStore, Field, JsonFileStore, MemoryStore};
pub use violations::{BlockedAction, ViolationOutcome, ViolationSignal, ViolationTracker};

use uuid::Uuid;

/// Isolates one student's persisted attempt state from another's.
///
/// `attempt_key` is any stable per-student identity: a registration
/// number, or a per-device storage scope for guest attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptScope {
    pub exam_id: Uuid,
    pub attempt_key: String,
}

impl AttemptScope {
    pub fn new(exam_id: Uuid, attempt_key: impl Into<String>) -> Self {
        AttemptScope {
            exam_id,
            attempt_key: attempt_key.into(),
        }
    }

    /// Flat storage key for a field of this scope.
    pub(crate) fn storage_key(&self, field: Field) -> String {
        format!("{}:{}:{}", self.exam_id, self.attempt_key, field.as_str())
    }
}
