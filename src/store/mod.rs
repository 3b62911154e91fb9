pub mod persist;

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::models::{Operation, Stroke};

/// Authoritative per-process stroke set.
///
/// Apply is idempotent: re-inserting an existing id and deleting a missing
/// target are both rejected without error, which makes re-delivery and
/// reordering within a peer's stream safe. A read-write lock lets
/// concurrent snapshot readers proceed while mutation is exclusive.
#[derive(Debug, Default)]
pub struct OperationStore {
    inner: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    strokes: HashMap<String, Stroke>,
    order: Vec<String>,
}

impl OperationStore {
    pub fn new() -> Self {
        OperationStore::default()
    }

    /// Apply one operation. Returns whether the store changed.
    ///
    /// Insert is rejected when the stroke id is empty or already present
    /// (first writer wins; strokes are immutable so there is nothing to
    /// merge). Delete of an absent target is a no-op, never an error.
    pub fn apply(&self, op: &Operation) -> bool {
        let mut state = self.inner.write().expect("store lock poisoned");
        match op {
            Operation::Insert { stroke, .. } => {
                if stroke.id.is_empty() || state.strokes.contains_key(&stroke.id) {
                    return false;
                }
                state.order.push(stroke.id.clone());
                state.strokes.insert(stroke.id.clone(), stroke.clone());
                true
            }
            Operation::Delete { target, .. } => {
                if target.is_empty() || state.strokes.remove(target).is_none() {
                    return false;
                }
                state.order.retain(|id| id != target);
                true
            }
        }
    }

    /// All current strokes in render order: timestamp ascending, ties
    /// broken by id. Deterministic regardless of arrival order.
    pub fn snapshot(&self) -> Vec<Stroke> {
        let state = self.inner.read().expect("store lock poisoned");
        let mut out: Vec<Stroke> = state
            .order
            .iter()
            .filter_map(|id| state.strokes.get(id).cloned())
            .collect();
        out.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Remove every stroke attributed to `site` and return the equivalent
    /// batch of delete operations for broadcast.
    pub fn clear_owner(&self, site: &str, lamport: u64) -> Vec<Operation> {
        let mut state = self.inner.write().expect("store lock poisoned");
        let doomed: Vec<String> = state
            .order
            .iter()
            .filter(|id| state.strokes.get(*id).map(|s| s.site == site).unwrap_or(false))
            .cloned()
            .collect();
        for id in &doomed {
            state.strokes.remove(id);
        }
        state.order.retain(|id| !doomed.contains(id));
        debug!("cleared {} strokes for site {}", doomed.len(), site);
        doomed
            .into_iter()
            .map(|target| Operation::Delete {
                target,
                lamport,
                site: site.to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the entire state. Caller guarantees the strokes were parsed
    /// successfully; used by load so a bad file never half-applies.
    pub(crate) fn replace_all(&self, strokes: Vec<Stroke>) {
        let mut state = self.inner.write().expect("store lock poisoned");
        state.strokes.clear();
        state.order.clear();
        for stroke in strokes {
            state.order.push(stroke.id.clone());
            state.strokes.insert(stroke.id.clone(), stroke);
        }
    }
}
