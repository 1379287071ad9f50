// src/attempt/store.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::AttemptScope;

/// The per-attempt fields the engine persists. Structured on purpose:
/// callers never assemble raw string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Millisecond timestamp recorded on first load of the attempt.
    StartedAt,
    /// Accumulated proctoring violations.
    WarningCount,
    /// Persisted permutation of original question indices.
    QuestionOrder,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::StartedAt, Field::WarningCount, Field::QuestionOrder];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Field::StartedAt => "started_at",
            Field::WarningCount => "warnings",
            Field::QuestionOrder => "question_order",
        }
    }
}

/// Durable client-local storage for attempt state, keyed by scope and
/// field. Survives reloads of the attempt screen; cleared as a unit on
/// successful submission.
///
/// Methods take `&self`: implementations use interior mutability so the
/// controller and its sub-components can share one store.
pub trait AttemptStore {
    fn get(&self, scope: &AttemptScope, field: Field) -> Option<String>;
    fn put(&self, scope: &AttemptScope, field: Field, value: String);
    fn remove(&self, scope: &AttemptScope, field: Field);

    /// Removes every persisted field for the scope (attempt closed).
    fn clear_scope(&self, scope: &AttemptScope) {
        for field in Field::ALL {
            self.remove(scope, field);
        }
    }
}

impl<T: AttemptStore + ?Sized> AttemptStore for &T {
    fn get(&self, scope: &AttemptScope, field: Field) -> Option<String> {
        (**self).get(scope, field)
    }
    fn put(&self, scope: &AttemptScope, field: Field, value: String) {
        (**self).put(scope, field, value)
    }
    fn remove(&self, scope: &AttemptScope, field: Field) {
        (**self).remove(scope, field)
    }
}

impl<T: AttemptStore + ?Sized> AttemptStore for Arc<T> {
    fn get(&self, scope: &AttemptScope, field: Field) -> Option<String> {
        (**self).get(scope, field)
    }
    fn put(&self, scope: &AttemptScope, field: Field, value: String) {
        (**self).put(scope, field, value)
    }
    fn remove(&self, scope: &AttemptScope, field: Field) {
        (**self).remove(scope, field)
    }
}

/// In-memory store. Backs tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptStore for MemoryStore {
    fn get(&self, scope: &AttemptScope, field: Field) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&scope.storage_key(field))
            .cloned()
    }

    fn put(&self, scope: &AttemptScope, field: Field, value: String) {
        self.entries
            .lock()
            .unwrap()
            .insert(scope.storage_key(field), value);
    }

    fn remove(&self, scope: &AttemptScope, field: Field) {
        self.entries.lock().unwrap().remove(&scope.storage_key(field));
    }
}

/// File-backed store: one JSON object on disk, written through on every
/// mutation. A missing or unreadable file starts empty rather than
/// failing, matching the timer's fail-open recovery.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Corrupt attempt store at {:?}, starting empty: {}", path, e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        JsonFileStore {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        match serde_json::to_string_pretty(entries) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.path, raw) {
                    tracing::warn!("Failed to write attempt store {:?}: {}", self.path, e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode attempt store: {}", e),
        }
    }
}

impl AttemptStore for JsonFileStore {
    fn get(&self, scope: &AttemptScope, field: Field) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&scope.storage_key(field))
            .cloned()
    }

    fn put(&self, scope: &AttemptScope, field: Field, value: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(scope.storage_key(field), value);
        self.persist(&entries);
    }

    fn remove(&self, scope: &AttemptScope, field: Field) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(&scope.storage_key(field)).is_some() {
            self.persist(&entries);
        }
    }
}
