// ── Subscribed view engine ──
//
// Wraps a view and keeps its inputs in sync with the backend. All state
// lives in `SyncState` and is only ever touched from the task that owns
// the engine: subscription callbacks and fetch tasks just enqueue
// `Inbound` messages, which `dispatch` applies one at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_api::Endpoint;

use crate::config::EngineOptions;
use crate::error::CoreError;
use crate::loader::LoadGate;
use crate::mapping::{EndpointsMapping, Key};
use crate::merge::{ExposedState, MergeGate, Props};
use crate::projector::{FetchOutcome, Projection, StateProjector};
use crate::resolver::EndpointResolver;
use crate::state::{MirroredState, SliceFailure};
use crate::stream::ExposedStream;
use crate::subscription::{ReconcileReport, SubscriptionManager};
use crate::transport::{EventSink, Fetch, FetchKind, Generation, Inbound, Subscribe};

// ── View capability ──────────────────────────────────────────────────

/// Anything that can turn exposed state into output.
pub trait View {
    type Output;

    fn render(&mut self, state: &ExposedState) -> Self::Output;
}

impl<F, O> View for F
where
    F: FnMut(&ExposedState) -> O,
{
    type Output = O;

    fn render(&mut self, state: &ExposedState) -> O {
        self(state)
    }
}

// ── Engine ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct SyncState {
    subscriptions: SubscriptionManager,
    mirrored: MirroredState,
    gate: LoadGate,
    alive: bool,
}

/// A view decorated with live endpoint subscriptions.
pub struct Subscribed<V, T> {
    view: V,
    transport: Arc<T>,
    resolver: EndpointResolver,
    options: EngineOptions,
    projector: StateProjector,
    props: Props,
    sync: SyncState,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    exposed_tx: watch::Sender<Arc<ExposedState>>,
}

enum Step {
    Props(Props),
    Inbound(Inbound),
    Stop,
}

impl<V, T> Subscribed<V, T>
where
    V: View,
    T: Fetch + Subscribe + Send + Sync + 'static,
{
    pub fn new(view: V, transport: Arc<T>, resolver: EndpointResolver, options: EngineOptions) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (exposed_tx, _) = watch::channel(Arc::new(ExposedState::default()));
        let gate = LoadGate::new(options.wait_for_all, options.subscribe_without_loading);

        Self {
            view,
            transport,
            resolver,
            projector: StateProjector::new(options.reload_policy),
            options,
            props: Props::new(),
            sync: SyncState {
                subscriptions: SubscriptionManager::new(),
                mirrored: MirroredState::new(),
                gate,
                alive: true,
            },
            inbound_tx,
            inbound_rx,
            exposed_tx,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// First input: resolve, subscribe and start the initial load.
    pub fn mount(&mut self, props: Props) -> Result<ReconcileReport, CoreError> {
        let report = self.set_props(props)?;
        info!(
            keys = self.mapping().map_or(0, EndpointsMapping::len),
            "view mounted"
        );
        Ok(report)
    }

    /// New inputs: resolve again and reconcile subscriptions.
    ///
    /// A resolution error aborts the cycle and leaves everything,
    /// including the previous props, as it was.
    pub fn set_props(&mut self, props: Props) -> Result<ReconcileReport, CoreError> {
        if !self.sync.alive {
            return Err(CoreError::TornDown);
        }

        let mapping = self.resolver.resolve(&props).inspect_err(|error| {
            warn!(%error, "endpoint resolution failed");
        })?;
        self.props = props;

        let tx = self.inbound_tx.clone();
        let report = self
            .sync
            .subscriptions
            .reconcile(&mapping, self.transport.as_ref(), |key, generation| {
                EventSink::new(key.clone(), generation, tx.clone())
            });

        for key in &report.dropped {
            self.sync.mirrored.remove(key.as_str());
            self.sync.gate.forget(key.as_str());
        }

        let bound = report
            .subscribed
            .iter()
            .chain(report.failed.iter().map(|(bound, _)| bound));
        for b in bound {
            if !b.retry {
                // A new endpoint for an existing key starts over.
                self.sync.mirrored.remove(b.key.as_str());
                self.sync.gate.forget(b.key.as_str());
            }
        }

        if !self.options.subscribe_without_loading {
            let loads: Vec<_> = report
                .subscribed
                .iter()
                .chain(
                    report
                        .failed
                        .iter()
                        .map(|(bound, _)| bound)
                        .filter(|b| !b.retry),
                )
                .map(|b| (b.key.clone(), b.endpoint.clone(), b.generation))
                .collect();
            for (key, endpoint, generation) in loads {
                self.issue_fetch(key, endpoint, generation, FetchKind::Load);
            }
        }

        if !report.is_noop() {
            debug!(
                subscribed = report.subscribed.len(),
                released = report.released.len(),
                dropped = report.dropped.len(),
                failed = report.failed.len(),
                "reconciled"
            );
        }
        self.publish();
        Ok(report)
    }

    /// Release every subscription and drop all mirrored state.
    ///
    /// Messages still in flight are ignored from here on. Calling this
    /// again does nothing.
    pub fn teardown(&mut self) {
        if !self.sync.alive {
            return;
        }
        self.sync.alive = false;
        let released = self.sync.subscriptions.teardown();
        self.sync.mirrored.clear();
        self.sync.gate.clear();
        while self.inbound_rx.try_recv().is_ok() {}
        self.exposed_tx
            .send_replace(Arc::new(ExposedState::default()));
        info!(released, "view torn down");
    }

    pub fn is_alive(&self) -> bool {
        self.sync.alive
    }

    // ── Inbound messages ─────────────────────────────────────────────

    fn issue_fetch(&mut self, key: Key, endpoint: Endpoint, generation: Generation, kind: FetchKind) {
        let requested_at = self.sync.mirrored.revision(key.as_str());
        if kind == FetchKind::Load {
            self.sync.gate.mark_pending(&key);
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(key = %key, %endpoint, "cannot fetch without an async runtime");
                self.sync
                    .mirrored
                    .fail(key.clone(), SliceFailure::new(endpoint, e.to_string()));
                self.sync.gate.mark_completed(&key);
                return;
            }
        };

        debug!(key = %key, %endpoint, ?kind, "fetching");
        let fetch = self.transport.fetch(&endpoint);
        let tx = self.inbound_tx.clone();
        handle.spawn(async move {
            let result = fetch.await;
            // The engine may be gone by now; that is fine.
            let _ = tx.send(Inbound::Fetched {
                key,
                generation,
                kind,
                endpoint,
                requested_at,
                result,
            });
        });
    }

    /// Apply one inbound message. Returns `true` if the exposed state changed.
    ///
    /// After teardown, and for messages from a superseded subscription,
    /// this does nothing.
    pub fn dispatch(&mut self, inbound: Inbound) -> bool {
        if !self.sync.alive {
            return false;
        }
        if !self
            .sync
            .subscriptions
            .is_current(inbound.key().as_str(), inbound.generation())
        {
            debug!(key = %inbound.key(), generation = inbound.generation(), "dropping stale message");
            return false;
        }

        match inbound {
            Inbound::Event {
                key,
                generation,
                event,
            } => match self.projector.apply(&mut self.sync.mirrored, &key, event) {
                Ok(Projection::Applied) => self.publish(),
                Ok(Projection::Reload(subject)) => {
                    self.issue_fetch(key, subject, generation, FetchKind::Reload);
                    false
                }
                Err(error) => {
                    warn!(key = %key, %error, "event rejected");
                    false
                }
            },
            Inbound::Fetched {
                key,
                kind,
                endpoint,
                requested_at,
                result,
                ..
            } => {
                if let Err(error) = &result {
                    warn!(key = %key, %endpoint, ?kind, %error, "fetch failed");
                }
                let outcome = self.projector.apply_fetched(
                    &mut self.sync.mirrored,
                    &key,
                    endpoint,
                    requested_at,
                    result,
                );
                if outcome == FetchOutcome::Discarded {
                    debug!(key = %key, "stale reload discarded");
                }
                self.sync.gate.mark_completed(&key);
                self.publish()
            }
        }
    }

    /// Wait for the next inbound message.
    pub async fn next_inbound(&mut self) -> Option<Inbound> {
        self.inbound_rx.recv().await
    }

    /// Apply every message already queued. Returns how many changed state.
    pub fn pump(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(inbound) = self.inbound_rx.try_recv() {
            if self.dispatch(inbound) {
                changed += 1;
            }
        }
        changed
    }

    // ── Exposure ─────────────────────────────────────────────────────

    fn publish(&self) -> bool {
        if !self.sync.alive {
            return false;
        }
        let ready = self
            .sync
            .subscriptions
            .last_mapping()
            .is_none_or(|mapping| self.sync.gate.is_open(mapping));
        let next = MergeGate::merge(&self.sync.mirrored, &self.props, ready);
        self.exposed_tx.send_if_modified(|current| {
            if **current == next {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }

    /// Render the view from the current exposed state. `None` while gated
    /// or after teardown.
    pub fn render(&mut self) -> Option<V::Output> {
        if !self.sync.alive {
            return None;
        }
        let state = self.exposed();
        state.ready.then(|| self.view.render(&state))
    }

    pub fn exposed(&self) -> Arc<ExposedState> {
        self.exposed_tx.borrow().clone()
    }

    pub fn watch(&self) -> ExposedStream {
        ExposedStream::new(self.exposed_tx.subscribe())
    }

    pub fn is_ready(&self) -> bool {
        self.exposed_tx.borrow().ready
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn mapping(&self) -> Option<&EndpointsMapping> {
        self.sync.subscriptions.last_mapping()
    }

    pub fn mirrored(&self) -> &MirroredState {
        &self.sync.mirrored
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.sync.subscriptions
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    // ── Driver loop ──────────────────────────────────────────────────

    /// Drive the view until `cancel` fires or the props sender is dropped.
    ///
    /// Mounts with the current props, then applies props changes and
    /// inbound messages in arrival order, calling `emit` with fresh
    /// output after every change. Tears down before returning the view.
    pub async fn run<E>(
        mut self,
        mut props_rx: watch::Receiver<Props>,
        cancel: CancellationToken,
        mut emit: E,
    ) -> Result<V, CoreError>
    where
        E: FnMut(V::Output),
    {
        let initial = props_rx.borrow_and_update().clone();
        if let Err(e) = self.mount(initial) {
            self.teardown();
            return Err(e);
        }
        if let Some(output) = self.render() {
            emit(output);
        }

        loop {
            let step = tokio::select! {
                () = cancel.cancelled() => Step::Stop,
                changed = props_rx.changed() => match changed {
                    Ok(()) => Step::Props(props_rx.borrow_and_update().clone()),
                    Err(_) => Step::Stop,
                },
                inbound = self.inbound_rx.recv() => inbound.map_or(Step::Stop, Step::Inbound),
            };

            let changed = match step {
                Step::Stop => break,
                Step::Props(props) => self.set_props(props).is_ok(),
                Step::Inbound(inbound) => self.dispatch(inbound),
            };
            if changed {
                if let Some(output) = self.render() {
                    emit(output);
                }
            }
        }

        self.teardown();
        Ok(self.view)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tether_api::{Action, Frame};

    use crate::transport::MemoryHub;

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => Props::new(),
        }
    }

    fn engine(
        hub: &MemoryHub,
        mapping: EndpointsMapping,
    ) -> Subscribed<impl FnMut(&ExposedState) -> Value, MemoryHub> {
        Subscribed::new(
            |s: &ExposedState| Value::Object(s.values.clone()),
            Arc::new(hub.clone()),
            EndpointResolver::fixed(mapping),
            EngineOptions::default(),
        )
    }

    async fn settle<V: View>(e: &mut Subscribed<V, MemoryHub>) {
        while e.sync.gate.pending() > 0 {
            let msg = e.next_inbound().await.unwrap();
            e.dispatch(msg);
        }
    }

    #[tokio::test]
    async fn mount_loads_then_opens_gate() {
        let hub = MemoryHub::new();
        hub.set_value("E1", json!([]));
        let mut e = engine(&hub, EndpointsMapping::new().with("a", "E1"));

        e.mount(Props::new()).unwrap();
        assert!(e.render().is_none());

        settle(&mut e).await;
        assert_eq!(e.render(), Some(json!({ "a": [] })));
    }

    #[tokio::test]
    async fn event_from_superseded_generation_is_dropped() {
        let hub = MemoryHub::new();
        hub.set_value("E1", json!("one"));
        let mut e = engine(&hub, EndpointsMapping::new().with("a", "E1"));
        e.mount(Props::new()).unwrap();
        settle(&mut e).await;

        let generation = e.subscriptions().generation("a").unwrap();
        let stale = Inbound::Event {
            key: Key::from("a"),
            generation: generation + 100,
            event: tether_api::Event::Replace { object: json!("x") },
        };
        assert!(!e.dispatch(stale));
        assert_eq!(e.exposed().get("a"), Some(&json!("one")));
    }

    #[tokio::test]
    async fn teardown_refuses_new_props() {
        let hub = MemoryHub::new();
        let mut e = engine(&hub, EndpointsMapping::new());
        e.mount(Props::new()).unwrap();
        e.teardown();
        assert!(matches!(e.set_props(props(json!({}))), Err(CoreError::TornDown)));
        assert!(e.render().is_none());
    }

    #[tokio::test]
    async fn published_event_reaches_slice() {
        let hub = MemoryHub::new();
        hub.set_value("E1", json!([]));
        let mut e = engine(&hub, EndpointsMapping::new().with("a", "E1"));
        e.mount(Props::new()).unwrap();
        settle(&mut e).await;

        assert_eq!(hub.publish(Frame::new("E1", Action::Append, json!("tx1"))), 1);
        assert_eq!(e.pump(), 1);
        assert_eq!(e.exposed().get("a"), Some(&json!(["tx1"])));
    }
}
