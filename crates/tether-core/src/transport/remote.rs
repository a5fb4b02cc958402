// ── Remote transport ──
//
// Fetches over HTTP with `ApiClient` and fans push frames out of a shared
// `EventHub` to per-key subscription tasks. Each task filters the
// broadcast stream by subject and stops when its `Release` fires.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use tether_api::{ApiClient, Endpoint, Event, EventHub, Frame};

use super::{EventSink, Fetch, Release, Subscribe};
use crate::error::CoreError;

/// Backend reached through tether-api.
#[derive(Debug, Clone)]
pub struct Remote {
    client: ApiClient,
    hub: EventHub,
}

impl Remote {
    pub fn new(client: ApiClient, hub: EventHub) -> Self {
        Self { client, hub }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Stop the shared event socket. Outstanding subscriptions end too.
    pub fn shutdown(&self) {
        self.hub.shutdown();
    }
}

impl Fetch for Remote {
    fn fetch(&self, endpoint: &Endpoint) -> BoxFuture<'static, Result<Value, CoreError>> {
        let client = self.client.clone();
        let endpoint = endpoint.clone();
        async move {
            client.fetch(&endpoint).await.map_err(|e| CoreError::Fetch {
                reason: e.to_string(),
                endpoint,
            })
        }
        .boxed()
    }
}

impl Subscribe for Remote {
    fn subscribe(&self, endpoint: &Endpoint, sink: EventSink) -> Result<Release, CoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| CoreError::Subscribe {
            endpoint: endpoint.clone(),
            reason: format!("no async runtime: {e}"),
        })?;
        if self.hub.cancel_token().is_cancelled() {
            return Err(CoreError::Subscribe {
                endpoint: endpoint.clone(),
                reason: "event hub is shut down".into(),
            });
        }

        let cancel = self.hub.cancel_token().child_token();
        let mut rx = self.hub.subscribe_frames();
        let subject = endpoint.clone();
        let task_cancel = cancel.clone();

        handle.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    recv = rx.recv() => match recv {
                        Ok(frame) => {
                            if frame.subject != subject {
                                continue;
                            }
                            if !sink.deliver(Frame::clone(&frame).into_event()) {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%subject, skipped, "event subscriber lagged, reloading");
                            let resync = Event::Reload {
                                subject: subject.clone(),
                            };
                            if !sink.deliver(resync) {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!(%subject, key = %sink.key(), "subscription task ended");
        });

        Ok(Release::new(move || cancel.cancel()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tether_api::{Action, TransportConfig};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    use crate::mapping::Key;
    use crate::transport::Inbound;

    fn remote() -> Remote {
        let client = ApiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            &TransportConfig::default(),
        )
        .unwrap();
        Remote::new(client, EventHub::detached(CancellationToken::new()))
    }

    #[tokio::test]
    async fn frames_are_filtered_by_subject() {
        let remote = remote();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Key::from("status"), 1, tx);
        let _release = remote
            .subscribe(&Endpoint::from("devices/a/status"), sink)
            .unwrap();
        tokio::task::yield_now().await;

        remote
            .hub()
            .publish(Frame::new("devices/b/status", Action::Replace, json!("other")));
        remote
            .hub()
            .publish(Frame::new("devices/a/status", Action::Replace, json!("mine")));

        let inbound = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match inbound {
            Inbound::Event { key, event, .. } => {
                assert_eq!(key, Key::from("status"));
                assert_eq!(event, Event::Replace { object: json!("mine") });
            }
            other @ Inbound::Fetched { .. } => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_stops_delivery() {
        let remote = remote();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Key::from("status"), 1, tx);
        let mut release = remote.subscribe(&Endpoint::from("e"), sink).unwrap();

        release.release();
        // The task owns the only sender; once it exits the queue closes.
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn subscribe_outside_runtime_fails() {
        let remote = remote();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Key::from("status"), 1, tx);
        let err = remote.subscribe(&Endpoint::from("e"), sink).unwrap_err();
        assert!(matches!(err, CoreError::Subscribe { .. }));
    }
}
