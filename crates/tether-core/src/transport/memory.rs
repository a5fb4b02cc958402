// ── In-process transport ──
//
// A backend that lives entirely in memory: endpoint values are set
// directly, frames are published by hand, and every subscribe/release is
// counted. Used by the test suite and by embedders without a backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::trace;

use tether_api::{Endpoint, Frame};

use super::{EventSink, Fetch, Release, Subscribe};
use crate::error::CoreError;

#[derive(Debug)]
struct Subscriber {
    endpoint: Endpoint,
    sink: EventSink,
}

#[derive(Debug, Default)]
struct HubInner {
    values: HashMap<Endpoint, Value>,
    fetch_failures: HashMap<Endpoint, String>,
    fetch_counts: HashMap<Endpoint, usize>,
    refused: HashSet<Endpoint>,
    subscribers: IndexMap<u64, Subscriber>,
    next_id: u64,
    subscribe_count: usize,
    release_count: usize,
}

/// In-memory backend. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
    fetch_gate: Arc<watch::Sender<bool>>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        let (fetch_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(HubInner::default())),
            fetch_gate: Arc::new(fetch_gate),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Backend values ───────────────────────────────────────────────

    /// Set the value served for `endpoint` and clear any injected failure.
    pub fn set_value(&self, endpoint: impl Into<Endpoint>, value: Value) {
        let endpoint = endpoint.into();
        let mut inner = self.lock();
        inner.fetch_failures.remove(&endpoint);
        inner.values.insert(endpoint, value);
    }

    /// Make every fetch of `endpoint` fail with `reason`.
    pub fn fail_fetch(&self, endpoint: impl Into<Endpoint>, reason: impl Into<String>) {
        self.lock()
            .fetch_failures
            .insert(endpoint.into(), reason.into());
    }

    /// Park all fetches until [`resume_fetches`](Self::resume_fetches).
    pub fn hold_fetches(&self) {
        self.fetch_gate.send_replace(false);
    }

    pub fn resume_fetches(&self) {
        self.fetch_gate.send_replace(true);
    }

    /// Refuse new subscriptions to `endpoint`.
    pub fn fail_subscriptions(&self, endpoint: impl Into<Endpoint>) {
        self.lock().refused.insert(endpoint.into());
    }

    pub fn allow_subscriptions(&self, endpoint: &Endpoint) {
        self.lock().refused.remove(endpoint);
    }

    // ── Push ─────────────────────────────────────────────────────────

    /// Deliver `frame` to every live subscriber of its subject.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, frame: Frame) -> usize {
        let inner = self.lock();
        inner
            .subscribers
            .values()
            .filter(|s| s.endpoint == frame.subject)
            .filter(|s| s.sink.deliver(frame.clone().into_event()))
            .count()
    }

    // ── Counters ─────────────────────────────────────────────────────

    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    pub fn release_count(&self) -> usize {
        self.lock().release_count
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Live subscriptions on one endpoint.
    pub fn active_on(&self, endpoint: &Endpoint) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|s| &s.endpoint == endpoint)
            .count()
    }

    pub fn fetch_count(&self, endpoint: &Endpoint) -> usize {
        self.lock().fetch_counts.get(endpoint).copied().unwrap_or(0)
    }
}

impl Fetch for MemoryHub {
    fn fetch(&self, endpoint: &Endpoint) -> BoxFuture<'static, Result<Value, CoreError>> {
        *self
            .lock()
            .fetch_counts
            .entry(endpoint.clone())
            .or_default() += 1;

        let inner = Arc::downgrade(&self.inner);
        let mut gate = self.fetch_gate.subscribe();
        let endpoint = endpoint.clone();

        async move {
            // A dropped hub also opens the gate.
            let _ = gate.wait_for(|open| *open).await;
            let Some(inner) = inner.upgrade() else {
                return Err(CoreError::Fetch {
                    endpoint,
                    reason: "backend is gone".into(),
                });
            };
            let inner = inner.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(reason) = inner.fetch_failures.get(&endpoint) {
                return Err(CoreError::Fetch {
                    reason: reason.clone(),
                    endpoint,
                });
            }
            inner
                .values
                .get(&endpoint)
                .cloned()
                .ok_or_else(|| CoreError::Fetch {
                    reason: "no such endpoint".into(),
                    endpoint,
                })
        }
        .boxed()
    }
}

impl Subscribe for MemoryHub {
    fn subscribe(&self, endpoint: &Endpoint, sink: EventSink) -> Result<Release, CoreError> {
        let mut inner = self.lock();
        if inner.refused.contains(endpoint) {
            return Err(CoreError::Subscribe {
                endpoint: endpoint.clone(),
                reason: "subscription refused".into(),
            });
        }

        inner.next_id += 1;
        inner.subscribe_count += 1;
        let id = inner.next_id;
        trace!(id, %endpoint, key = %sink.key(), "memory subscribe");
        inner.subscribers.insert(
            id,
            Subscriber {
                endpoint: endpoint.clone(),
                sink,
            },
        );

        let weak: Weak<Mutex<HubInner>> = Arc::downgrade(&self.inner);
        Ok(Release::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                if inner.subscribers.shift_remove(&id).is_some() {
                    inner.release_count += 1;
                }
            }
        }))
    }
}
