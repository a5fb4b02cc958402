// ── Exposed state streams ──
//
// Observers of a subscribed view's exposed state, fed by the engine's
// watch channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::merge::ExposedState;

/// A subscription to a view's exposed state.
///
/// Gives point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct ExposedStream {
    current: Arc<ExposedState>,
    receiver: watch::Receiver<Arc<ExposedState>>,
}

impl ExposedStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<ExposedState>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The state captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<ExposedState> {
        &self.current
    }

    /// The latest state, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<ExposedState> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the engine is dropped.
    pub async fn changed(&mut self) -> Option<Arc<ExposedState>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Wait until the view is no longer gated.
    pub async fn ready(&mut self) -> Option<Arc<ExposedState>> {
        let snap = self.receiver.wait_for(|s| s.ready).await.ok()?.clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> ExposedWatchStream {
        ExposedWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new exposed state, starting with the
/// current one.
pub struct ExposedWatchStream {
    inner: WatchStream<Arc<ExposedState>>,
}

impl Stream for ExposedWatchStream {
    type Item = Arc<ExposedState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn state(x: i64, ready: bool) -> Arc<ExposedState> {
        let mut values = crate::merge::Props::new();
        values.insert("x".into(), json!(x));
        Arc::new(ExposedState {
            values,
            ready,
            ..ExposedState::default()
        })
    }

    #[tokio::test]
    async fn changed_tracks_latest() {
        let (tx, rx) = watch::channel(state(0, false));
        let mut stream = ExposedStream::new(rx);
        assert_eq!(stream.current().get("x"), Some(&json!(0)));

        tx.send_replace(state(1, false));
        let next = stream.changed().await.unwrap();
        assert_eq!(next.get("x"), Some(&json!(1)));
        assert_eq!(stream.current().get("x"), Some(&json!(1)));

        drop(tx);
        assert!(stream.changed().await.is_none());
    }

    #[tokio::test]
    async fn ready_waits_for_gate() {
        let (tx, rx) = watch::channel(state(0, false));
        let mut stream = ExposedStream::new(rx);
        tx.send_replace(state(1, false));
        tx.send_replace(state(2, true));
        let snap = stream.ready().await.unwrap();
        assert!(snap.is_ready());
        assert_eq!(snap.get("x"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn into_stream_yields_current_first() {
        let (_tx, rx) = watch::channel(state(5, true));
        let mut stream = ExposedStream::new(rx).into_stream();
        assert_eq!(stream.next().await.unwrap().get("x"), Some(&json!(5)));
    }
}
