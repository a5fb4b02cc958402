// ── Subscription manager ──
//
// Keeps exactly one live subscription per key of the current mapping.
// `reconcile` diffs the new mapping against the previous one by value;
// only keys that are new, changed, or still unsubscribed from an earlier
// failure touch the transport.

use indexmap::IndexMap;
use tracing::{debug, warn};

use tether_api::Endpoint;

use crate::error::CoreError;
use crate::mapping::{EndpointsMapping, Key};
use crate::transport::{EventSink, Generation, Release, Subscribe};

/// One key's binding to an endpoint.
///
/// Holds the transport's release handle; dropping the subscription
/// releases it.
#[derive(Debug)]
pub struct Subscription {
    endpoint: Endpoint,
    generation: Generation,
    release: Option<Release>,
}

impl Subscription {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// `false` when subscribing failed or the handle was already released.
    pub fn is_live(&self) -> bool {
        self.release.as_ref().is_some_and(|r| !r.is_released())
    }

    fn release(&mut self) -> bool {
        match self.release.take() {
            Some(mut handle) if !handle.is_released() => {
                handle.release();
                true
            }
            _ => false,
        }
    }
}

/// A key that was (re)bound during a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub key: Key,
    pub endpoint: Endpoint,
    pub generation: Generation,
    /// The endpoint is unchanged; an earlier attempt left it unsubscribed.
    pub retry: bool,
}

/// What one reconcile did.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub subscribed: Vec<Bound>,
    /// Keys whose previous subscription was released, whether rebound or dropped.
    pub released: Vec<Key>,
    /// Keys no longer in the mapping.
    pub dropped: Vec<Key>,
    pub failed: Vec<(Bound, CoreError)>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.subscribed.is_empty()
            && self.released.is_empty()
            && self.dropped.is_empty()
            && self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionManager {
    last_mapping: Option<EndpointsMapping>,
    subscriptions: IndexMap<Key, Subscription>,
    next_generation: Generation,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring subscriptions in line with `mapping`.
    ///
    /// `make_sink` builds the delivery target for a key under a given
    /// generation. A failure to subscribe one key is reported and does
    /// not stop the others; that key is retried on the next call.
    pub fn reconcile<S, F>(
        &mut self,
        mapping: &EndpointsMapping,
        transport: &S,
        make_sink: F,
    ) -> ReconcileReport
    where
        S: Subscribe + ?Sized,
        F: Fn(&Key, Generation) -> EventSink,
    {
        let diff = mapping.diff(self.last_mapping.as_ref());
        let mut report = ReconcileReport::default();

        for key in diff.unbind {
            if let Some(mut sub) = self.subscriptions.shift_remove(&key) {
                if sub.release() {
                    report.released.push(key.clone());
                }
            }
            debug!(key = %key, "key dropped from mapping");
            report.dropped.push(key);
        }

        let mut pending: Vec<(Key, Endpoint, bool)> = diff
            .bind
            .into_iter()
            .map(|(key, endpoint)| (key, endpoint, false))
            .collect();
        for (key, endpoint) in mapping {
            let unsubscribed = self.subscriptions.get(key).is_none_or(|s| !s.is_live());
            if unsubscribed && !pending.iter().any(|(k, _, _)| k == key) {
                pending.push((key.clone(), endpoint.clone(), true));
            }
        }

        for (key, endpoint, retry) in pending {
            let generation = match self.subscriptions.get_mut(&key) {
                // Retrying keeps the generation so in-flight loads still count.
                Some(sub) if retry && sub.endpoint == endpoint => sub.generation,
                Some(sub) => {
                    if sub.release() {
                        report.released.push(key.clone());
                    }
                    self.bump()
                }
                None => self.bump(),
            };

            let bound = Bound {
                key: key.clone(),
                endpoint: endpoint.clone(),
                generation,
                retry,
            };
            let sink = make_sink(&key, generation);
            let release = match transport.subscribe(&endpoint, sink) {
                Ok(release) => {
                    debug!(key = %key, %endpoint, generation, "subscribed");
                    report.subscribed.push(bound);
                    Some(release)
                }
                Err(error) => {
                    warn!(key = %key, %endpoint, %error, "subscribe failed");
                    report.failed.push((bound, error));
                    None
                }
            };
            self.subscriptions.insert(
                key,
                Subscription {
                    endpoint,
                    generation,
                    release,
                },
            );
        }

        self.last_mapping = Some(mapping.clone());
        report
    }

    fn bump(&mut self) -> Generation {
        self.next_generation += 1;
        self.next_generation
    }

    pub fn get(&self, key: &str) -> Option<&Subscription> {
        self.subscriptions.get(key)
    }

    pub fn generation(&self, key: &str) -> Option<Generation> {
        self.subscriptions.get(key).map(Subscription::generation)
    }

    /// Whether `generation` is the current binding of `key`.
    pub fn is_current(&self, key: &str, generation: Generation) -> bool {
        self.generation(key) == Some(generation)
    }

    pub fn endpoint(&self, key: &str) -> Option<&Endpoint> {
        self.subscriptions.get(key).map(Subscription::endpoint)
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.subscriptions.get(key).is_some_and(Subscription::is_live)
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.values().filter(|s| s.is_live()).count()
    }

    pub fn last_mapping(&self) -> Option<&EndpointsMapping> {
        self.last_mapping.as_ref()
    }

    /// Release one key's subscription. Returns `false` if nothing was live.
    ///
    /// The key stays in the mapping and is resubscribed on the next
    /// reconcile.
    pub fn release(&mut self, key: &str) -> bool {
        self.subscriptions.get_mut(key).is_some_and(Subscription::release)
    }

    /// Release everything and forget the mapping. Safe to call repeatedly.
    pub fn teardown(&mut self) -> usize {
        let mut released = 0;
        for sub in self.subscriptions.values_mut() {
            if sub.release() {
                released += 1;
            }
        }
        self.subscriptions.clear();
        self.last_mapping = None;
        if released > 0 {
            debug!(released, "subscriptions torn down");
        }
        released
    }
}
