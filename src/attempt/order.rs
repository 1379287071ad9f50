// src/attempt/order.rs

use rand::seq::SliceRandom;

use super::{
    AttemptScope,
    store::{AttemptStore, Field},
};

/// Decides the question sequence for an attempt and makes it durable.
///
/// When randomization is off the input order passes through untouched.
/// Otherwise a uniform permutation of *original indices* is generated
/// once and persisted; re-resolving reapplies it to the freshly fetched
/// question list, so question text edits show up while the order stays
/// stable across reloads. A persisted order that no longer matches the
/// current question count (the admin added or removed questions
/// mid-attempt) is discarded and regenerated.
pub fn resolve_order<T>(
    store: &dyn AttemptStore,
    scope: &AttemptScope,
    questions: Vec<T>,
    randomize: bool,
) -> Vec<T> {
    if !randomize {
        return questions;
    }

    let n = questions.len();

    if let Some(order) = load_valid_order(store, scope, n) {
        return apply_order(questions, &order);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rand::thread_rng());

    match serde_json::to_string(&order) {
        Ok(raw) => store.put(scope, Field::QuestionOrder, raw),
        Err(e) => tracing::warn!("Failed to persist question order: {}", e),
    }

    apply_order(questions, &order)
}

/// Returns the stored permutation only if it is a genuine permutation of
/// `0..n`; anything stale or corrupt is dropped.
fn load_valid_order(store: &dyn AttemptStore, scope: &AttemptScope, n: usize) -> Option<Vec<usize>> {
    let raw = store.get(scope, Field::QuestionOrder)?;
    let order: Vec<usize> = serde_json::from_str(&raw).ok()?;
    if is_permutation(&order, n) {
        Some(order)
    } else {
        store.remove(scope, Field::QuestionOrder);
        None
    }
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &idx in order {
        if idx >= n || seen[idx] {
            return false;
        }
        seen[idx] = true;
    }
    true
}

fn apply_order<T>(questions: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = questions.into_iter().map(Some).collect();
    order.iter().filter_map(|&idx| slots[idx].take()).collect()
}
