// src/attempt/violations.rs

use super::{
    AttemptScope,
    store::{AttemptStore, Field},
};

/// Forced submission fires when the counter reaches this value.
pub const WARNING_LIMIT: u32 = 3;

/// Proctoring signals that count toward forced submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationSignal {
    /// The attempt window lost visibility (tab switch, minimize).
    FocusLost,
    /// Fullscreen was exited. `document_hidden` is true when the window
    /// is simultaneously hidden, in which case the exit is attributed to
    /// the visibility signal and not double-counted.
    FullscreenExited { document_hidden: bool },
}

/// Actions that are neutralized but never counted: they raise the cost
/// of circumvention without adding warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedAction {
    ContextMenu,
    /// Modifier chords, devtools and print-screen keys.
    KeyChord,
    /// Back/forward navigation; the shell re-pushes the current history
    /// entry and shows a one-line notice.
    BackNavigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Security disabled, tracker frozen, or a suppressed double-count.
    Ignored,
    /// Non-blocking warning naming the remaining attempts.
    Warning { count: u32, remaining: u32 },
    /// Third strike: submit now through the same path as a manual finish.
    ForceSubmit { count: u32 },
}

/// Converts proctoring signals into escalating warnings.
///
/// Owns the authoritative counter (persisted per attempt scope, so a
/// reload does not reset accumulated violations) and exposes it through
/// a synchronous accessor rather than captured closures. Inert when the
/// exam has security disabled: no signal has any effect.
#[derive(Debug)]
pub struct ViolationTracker {
    enabled: bool,
    frozen: bool,
    count: u32,
}

impl ViolationTracker {
    /// Loads the persisted counter for this scope. An unreadable stored
    /// value starts the count at zero.
    pub fn load(store: &dyn AttemptStore, scope: &AttemptScope, enabled: bool) -> Self {
        let count = store
            .get(scope, Field::WarningCount)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        ViolationTracker {
            enabled,
            frozen: false,
            count,
        }
    }

    pub fn observe(
        &mut self,
        store: &dyn AttemptStore,
        scope: &AttemptScope,
        signal: ViolationSignal,
    ) -> ViolationOutcome {
        if !self.enabled || self.frozen {
            return ViolationOutcome::Ignored;
        }

        if let ViolationSignal::FullscreenExited {
            document_hidden: true,
        } = signal
        {
            // The alt-tab that hid the document already fired FocusLost.
            return ViolationOutcome::Ignored;
        }

        self.count += 1;
        store.put(scope, Field::WarningCount, self.count.to_string());

        if self.count >= WARNING_LIMIT {
            self.frozen = true;
            ViolationOutcome::ForceSubmit { count: self.count }
        } else {
            ViolationOutcome::Warning {
                count: self.count,
                remaining: WARNING_LIMIT - self.count,
            }
        }
    }

    /// Whether the shell should neutralize this action. Blocked actions
    /// never touch the counter.
    pub fn blocks(&self, _action: BlockedAction) -> bool {
        self.enabled
    }

    pub fn current_warning_count(&self) -> u32 {
        self.count
    }

    /// Suppresses all further signal processing (submission in flight).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Re-arms the tracker after a failed submission leaves the attempt
    /// open again.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::store::MemoryStore;
    use uuid::Uuid;

    fn scope() -> AttemptScope {
        AttemptScope::new(Uuid::new_v4(), "R-001")
    }

    #[test]
    fn focus_loss_escalates_to_forced_submission() {
        let store = MemoryStore::new();
        let scope = scope();
        let mut tracker = ViolationTracker::load(&store, &scope, true);

        assert_eq!(
            tracker.observe(&store, &scope, ViolationSignal::FocusLost),
            ViolationOutcome::Warning {
                count: 1,
                remaining: 2
            }
        );
        assert_eq!(
            tracker.observe(&store, &scope, ViolationSignal::FocusLost),
            ViolationOutcome::Warning {
                count: 2,
                remaining: 1
            }
        );
        assert_eq!(
            tracker.observe(&store, &scope, ViolationSignal::FocusLost),
            ViolationOutcome::ForceSubmit { count: 3 }
        );

        // Frozen after the third strike: no further escalation.
        assert_eq!(
            tracker.observe(&store, &scope, ViolationSignal::FocusLost),
            ViolationOutcome::Ignored
        );
    }

    #[test]
    fn hidden_fullscreen_exit_is_not_double_counted() {
        let store = MemoryStore::new();
        let scope = scope();
        let mut tracker = ViolationTracker::load(&store, &scope, true);

        assert_eq!(
            tracker.observe(
                &store,
                &scope,
                ViolationSignal::FullscreenExited {
                    document_hidden: true
                }
            ),
            ViolationOutcome::Ignored
        );
        assert_eq!(tracker.current_warning_count(), 0);

        // A visible fullscreen exit does count.
        assert_eq!(
            tracker.observe(
                &store,
                &scope,
                ViolationSignal::FullscreenExited {
                    document_hidden: false
                }
            ),
            ViolationOutcome::Warning {
                count: 1,
                remaining: 2
            }
        );
    }

    #[test]
    fn disabled_security_means_no_listeners_no_warnings() {
        let store = MemoryStore::new();
        let scope = scope();
        let mut tracker = ViolationTracker::load(&store, &scope, false);

        assert_eq!(
            tracker.observe(&store, &scope, ViolationSignal::FocusLost),
            ViolationOutcome::Ignored
        );
        assert!(!tracker.blocks(BlockedAction::ContextMenu));
        assert_eq!(store.get(&scope, Field::WarningCount), None);
    }

    #[test]
    fn counter_survives_reload() {
        let store = MemoryStore::new();
        let scope = scope();
        let mut tracker = ViolationTracker::load(&store, &scope, true);
        tracker.observe(&store, &scope, ViolationSignal::FocusLost);
        tracker.observe(&store, &scope, ViolationSignal::FocusLost);

        let reloaded = ViolationTracker::load(&store, &scope, true);
        assert_eq!(reloaded.current_warning_count(), 2);
    }

    #[test]
    fn blocked_actions_never_increment() {
        let store = MemoryStore::new();
        let scope = scope();
        let tracker = ViolationTracker::load(&store, &scope, true);

        assert!(tracker.blocks(BlockedAction::ContextMenu));
        assert!(tracker.blocks(BlockedAction::KeyChord));
        assert!(tracker.blocks(BlockedAction::BackNavigation));
        assert_eq!(tracker.current_warning_count(), 0);
    }
}
