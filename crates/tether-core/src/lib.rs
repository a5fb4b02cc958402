// tether-core: Endpoint subscription engine between tether-api and views.

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod merge;
pub mod projector;
pub mod resolver;
pub mod state;
pub mod stream;
pub mod subscription;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{EngineOptions, ReloadPolicy};
pub use engine::{Subscribed, View};
pub use error::CoreError;
pub use loader::{LoadGate, load_all};
pub use mapping::{EndpointsMapping, Key, MappingDiff};
pub use merge::{ExposedState, MergeGate, Props};
pub use projector::{FetchOutcome, Projection, StateProjector};
pub use resolver::{EndpointResolver, EndpointTemplate};
pub use state::{MirroredState, Revision, Slice, SliceFailure};
pub use stream::{ExposedStream, ExposedWatchStream};
pub use subscription::{Bound, ReconcileReport, Subscription, SubscriptionManager};
pub use transport::{
    EventSink, Fetch, FetchKind, Generation, Inbound, MemoryHub, Release, Remote, Subscribe,
};

// Wire types callers need alongside the engine.
pub use tether_api::{Action, Endpoint, Event, Frame};
