// ── Initial load ──
//
// The first fetch of every key, and the gate that hides a view until
// those fetches have completed. A failed fetch counts as completed: the
// failure is exposed on the key instead of holding the view back.

use std::collections::HashSet;

use futures_util::future::join_all;
use serde_json::Value;

use crate::error::CoreError;
use crate::mapping::{EndpointsMapping, Key};
use crate::transport::Fetch;

/// Fetch every endpoint of `mapping` concurrently.
///
/// Results come back in mapping order.
pub async fn load_all<F>(fetcher: &F, mapping: &EndpointsMapping) -> Vec<(Key, Result<Value, CoreError>)>
where
    F: Fetch + ?Sized,
{
    let keys: Vec<Key> = mapping.keys().cloned().collect();
    let fetches = mapping.iter().map(|(_, endpoint)| fetcher.fetch(endpoint));
    keys.into_iter().zip(join_all(fetches).await).collect()
}

/// Tracks which keys have completed their initial fetch.
#[derive(Debug, Clone, Default)]
pub struct LoadGate {
    wait_for_all: bool,
    bypass: bool,
    completed: HashSet<Key>,
    pending: HashSet<Key>,
}

impl LoadGate {
    pub fn new(wait_for_all: bool, bypass: bool) -> Self {
        Self {
            wait_for_all,
            bypass,
            ..Self::default()
        }
    }

    /// A load for `key` was issued. Keys that completed once stay completed.
    pub fn mark_pending(&mut self, key: &Key) {
        if !self.completed.contains(key) {
            self.pending.insert(key.clone());
        }
    }

    pub fn mark_completed(&mut self, key: &Key) {
        self.pending.remove(key);
        self.completed.insert(key.clone());
    }

    /// The key left the mapping; a later return starts from scratch.
    pub fn forget(&mut self, key: &str) {
        self.pending.remove(key);
        self.completed.remove(key);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.completed.clear();
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.contains(key)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether a view over `mapping` may be shown.
    pub fn is_open(&self, mapping: &EndpointsMapping) -> bool {
        self.bypass || !self.wait_for_all || mapping.keys().all(|k| self.completed.contains(k))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::transport::MemoryHub;

    fn mapping() -> EndpointsMapping {
        EndpointsMapping::new().with("a", "E1").with("b", "E2")
    }

    #[tokio::test]
    async fn load_all_returns_results_in_mapping_order() {
        let hub = MemoryHub::new();
        hub.set_value("E1", json!([1]));
        hub.fail_fetch("E2", "HTTP 503");

        let results = load_all(&hub, &mapping()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, Key::from("a"));
        assert_eq!(results[0].1.as_ref().unwrap(), &json!([1]));
        assert_eq!(results[1].0, Key::from("b"));
        assert!(results[1].1.is_err());
    }

    #[test]
    fn gate_waits_for_every_key() {
        let mut gate = LoadGate::new(true, false);
        let m = mapping();
        gate.mark_pending(&Key::from("a"));
        gate.mark_pending(&Key::from("b"));
        assert!(!gate.is_open(&m));

        gate.mark_completed(&Key::from("a"));
        assert!(!gate.is_open(&m));
        assert_eq!(gate.pending(), 1);

        gate.mark_completed(&Key::from("b"));
        assert!(gate.is_open(&m));
    }

    #[test]
    fn completed_key_is_not_pending_again() {
        let mut gate = LoadGate::new(true, false);
        gate.mark_completed(&Key::from("a"));
        gate.mark_pending(&Key::from("a"));
        assert_eq!(gate.pending(), 0);

        gate.forget("a");
        gate.mark_pending(&Key::from("a"));
        assert_eq!(gate.pending(), 1);
    }

    #[test]
    fn gate_open_without_wait_or_with_bypass() {
        assert!(LoadGate::new(false, false).is_open(&mapping()));
        assert!(LoadGate::new(true, true).is_open(&mapping()));
    }
}
