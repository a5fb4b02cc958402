// ── Mirrored state ──
//
// Last-known value per key, plus the per-key failure record for fetches
// that did not succeed. Every successful write is stamped with a revision
// taken from a single monotonic counter, so a stamp never repeats even
// across key removal and re-insertion.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use tether_api::Endpoint;

use crate::mapping::Key;

/// Revision stamp of a slice write. `0` means "never written".
pub type Revision = u64;

/// The mirrored value for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub value: Value,
    pub revision: Revision,
}

/// Why a key's value could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceFailure {
    pub endpoint: Endpoint,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl SliceFailure {
    pub fn new(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MirroredState {
    slices: IndexMap<Key, Slice>,
    failures: IndexMap<Key, SliceFailure>,
    last_revision: Revision,
}

impl MirroredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.slices.get(key).map(|s| &s.value)
    }

    pub fn slice(&self, key: &str) -> Option<&Slice> {
        self.slices.get(key)
    }

    /// Revision of the last write to `key`, or `0` if it has none.
    pub fn revision(&self, key: &str) -> Revision {
        self.slices.get(key).map_or(0, |s| s.revision)
    }

    /// Overwrite the slice for `key` and clear any failure recorded for it.
    pub fn write(&mut self, key: Key, value: Value) -> Revision {
        self.last_revision += 1;
        let revision = self.last_revision;
        self.failures.shift_remove(&key);
        self.slices.insert(key, Slice { value, revision });
        revision
    }

    /// Record a fetch failure. The last good value, if any, is kept.
    pub fn fail(&mut self, key: Key, failure: SliceFailure) {
        self.failures.insert(key, failure);
    }

    pub fn failure(&self, key: &str) -> Option<&SliceFailure> {
        self.failures.get(key)
    }

    pub fn failures(&self) -> &IndexMap<Key, SliceFailure> {
        &self.failures
    }

    /// Forget everything about `key`. Returns `true` if anything was held.
    pub fn remove(&mut self, key: &str) -> bool {
        let had_slice = self.slices.shift_remove(key).is_some();
        let had_failure = self.failures.shift_remove(key).is_some();
        had_slice || had_failure
    }

    pub fn clear(&mut self) {
        self.slices.clear();
        self.failures.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.slices.iter().map(|(k, s)| (k, &s.value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slices.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}
