// tether-api: HTTP fetch and push event transport for endpoint subscriptions

pub mod client;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod transport;
pub mod websocket;

pub use client::ApiClient;
pub use endpoint::Endpoint;
pub use error::Error;
pub use event::{Action, Event, Frame};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{EventHub, ReconnectConfig};
