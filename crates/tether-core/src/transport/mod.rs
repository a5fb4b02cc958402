// ── Transport seams ──
//
// The engine talks to the backend through two traits: `Fetch` for one-shot
// reads and `Subscribe` for push events. `remote` implements both over
// tether-api; `memory` implements both in-process for tests and demos.

pub mod memory;
pub mod remote;

use std::fmt;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use tether_api::{Endpoint, Event};

use crate::error::CoreError;
use crate::mapping::Key;
use crate::state::Revision;

pub use memory::MemoryHub;
pub use remote::Remote;

/// Identifies one binding of a key. Bumped on every rebind so messages
/// from a released subscription can be told apart from current ones.
pub type Generation = u64;

/// Whether a fetch is the initial load or a reload triggered by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Load,
    Reload,
}

/// Message delivered to the engine's inbound queue.
#[derive(Debug)]
pub enum Inbound {
    Event {
        key: Key,
        generation: Generation,
        event: Event,
    },
    Fetched {
        key: Key,
        generation: Generation,
        kind: FetchKind,
        endpoint: Endpoint,
        /// Revision of the key's slice when the fetch was issued.
        requested_at: Revision,
        result: Result<Value, CoreError>,
    },
}

impl Inbound {
    pub fn key(&self) -> &Key {
        match self {
            Self::Event { key, .. } | Self::Fetched { key, .. } => key,
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            Self::Event { generation, .. } | Self::Fetched { generation, .. } => *generation,
        }
    }
}

// ── EventSink ───────────────────────────────────────────────────────

/// Where a subscription delivers events for one key.
///
/// Every event is tagged with the key and generation it was bound under.
#[derive(Debug, Clone)]
pub struct EventSink {
    key: Key,
    generation: Generation,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EventSink {
    pub fn new(key: Key, generation: Generation, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self {
            key,
            generation,
            tx,
        }
    }

    /// Returns `false` once the engine is gone.
    pub fn deliver(&self, event: Event) -> bool {
        self.tx
            .send(Inbound::Event {
                key: self.key.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Release ─────────────────────────────────────────────────────────

/// Releases one transport subscription.
///
/// Dropping a `Release` releases it. Calling [`release`](Self::release)
/// more than once is a no-op.
pub struct Release {
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl Release {
    pub fn new(on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_release: Some(Box::new(on_release)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { on_release: None }
    }

    pub fn release(&mut self) {
        if let Some(f) = self.on_release.take() {
            f();
        }
    }

    pub fn is_released(&self) -> bool {
        self.on_release.is_none()
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("released", &self.is_released())
            .finish()
    }
}

// ── Traits ──────────────────────────────────────────────────────────

/// One-shot read of an endpoint's current value.
pub trait Fetch {
    fn fetch(&self, endpoint: &Endpoint) -> BoxFuture<'static, Result<Value, CoreError>>;
}

/// Push subscription to an endpoint.
pub trait Subscribe {
    /// Start delivering events for `endpoint` into `sink` until the
    /// returned handle is released.
    fn subscribe(&self, endpoint: &Endpoint, sink: EventSink) -> Result<Release, CoreError>;
}
