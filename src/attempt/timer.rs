// src/attempt/timer.rs

use chrono::{DateTime, TimeZone, Utc};

use super::{
    AttemptScope,
    clock::Clock,
    store::{AttemptStore, Field},
};

/// Countdown timer that survives reloads.
///
/// The start instant is recorded in the attempt store the first time the
/// attempt loads; every later `start` for the same scope reuses it, so
/// reloading the attempt screen never grants extra time. Remaining time
/// is recomputed from the stored instant on every query rather than
/// decremented, keeping it correct across suspended tabs and clock jumps.
#[derive(Debug, Clone)]
pub struct PersistentTimer {
    started_at: DateTime<Utc>,
    limit_seconds: i64,
}

impl PersistentTimer {
    /// Loads or establishes the start instant for this scope.
    ///
    /// A stored value that fails to parse, or that lies in the future,
    /// is replaced with "now" and re-persisted: the attempt restarts at
    /// full time rather than inheriting a bogus deadline.
    pub fn start(
        store: &dyn AttemptStore,
        scope: &AttemptScope,
        limit_minutes: u32,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        let stored = store
            .get(scope, Field::StartedAt)
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        let started_at = match stored {
            Some(instant) if instant <= now => instant,
            Some(_) => {
                tracing::warn!("Stored attempt start is in the future, restarting timer");
                store.put(scope, Field::StartedAt, now.timestamp_millis().to_string());
                now
            }
            None => {
                store.put(scope, Field::StartedAt, now.timestamp_millis().to_string());
                now
            }
        };

        PersistentTimer {
            started_at,
            limit_seconds: i64::from(limit_minutes) * 60,
        }
    }

    /// Seconds left on the attempt, floored at zero.
    pub fn remaining(&self, clock: &dyn Clock) -> u64 {
        let elapsed = (clock.now() - self.started_at).num_seconds().max(0);
        (self.limit_seconds - elapsed).max(0) as u64
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
