//! Broadcast hub: the registry of live push connections.
//!
//! Each registered client owns a [`Subscription`], the receiving half of a
//! bounded channel. The hub keeps the sending halves keyed by
//! [`ConnectionId`] and fans every broadcast out to all of them.
//!
//! Membership is kept consistent with the transport in two ways:
//!
//! - When the HTTP response body is dropped (client went away), the
//!   [`Subscription`] drop hook removes its entry. Removal is idempotent.
//! - When a broadcast finds a connection's receiver gone, that connection
//!   is pruned on the spot.
//!
//! Queues are unbounded: a client that reads slowly is never cut off, it
//! just accumulates frames until it catches up or disconnects.
//!
//! Messages are opaque pre-encoded text. The hub only applies
//! event-stream framing; it never looks inside.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use axum::body::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque identifier of a registered push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Shared interior of the hub. Subscriptions hold it weakly.
struct Registry {
    connections: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>>,
    next_id: AtomicU64,
}

impl Registry {
    // The map stays structurally valid even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: ConnectionId) -> bool {
        let (removed, live) = {
            let mut connections = self.lock();
            let removed = connections.remove(&id).is_some();
            (removed, connections.len())
        };
        if removed {
            debug!(%id, live, "Push connection removed");
        }
        removed
    }
}

/// Registry of live push connections with best-effort fan-out.
///
/// Cloning is cheap; all clones share one registry.
#[derive(Clone)]
pub struct BroadcastHub {
    registry: Arc<Registry>,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                connections: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Add a connection to the live set.
    pub fn register(&self) -> Subscription {
        self.attach(None)
    }

    /// Add a connection whose first frame is `snapshot`.
    ///
    /// The snapshot is queued before the connection becomes visible to
    /// [`broadcast`](Self::broadcast), so no broadcast can overtake it.
    pub fn register_with(&self, snapshot: &str) -> Subscription {
        self.attach(Some(frame(snapshot)))
    }

    fn attach(&self, first: Option<Bytes>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(first) = first {
            // The receiver is alive in this scope, so this cannot fail.
            let _ = tx.send(first);
        }

        let id = ConnectionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let live = {
            let mut connections = self.registry.lock();
            connections.insert(id, tx);
            connections.len()
        };
        debug!(%id, live, "Push connection registered");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `message` to every live connection.
    ///
    /// Returns the number of connections the frame was queued for.
    /// Connections whose receiver is gone are pruned, never retried.
    pub fn broadcast(&self, message: &str) -> usize {
        let frame = frame(message);
        let mut delivered: usize = 0;
        let mut dead = Vec::new();

        let live = {
            let mut connections = self.registry.lock();
            for (id, tx) in connections.iter() {
                if tx.send(frame.clone()).is_ok() {
                    delivered = delivered.saturating_add(1);
                } else {
                    debug!(%id, "Push connection closed before delivery");
                    dead.push(*id);
                }
            }
            for id in &dead {
                connections.remove(id);
            }
            connections.len()
        };

        if !dead.is_empty() {
            debug!(pruned = dead.len(), live, "Pruned dead push connections");
        }
        delivered
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.registry.remove(id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Whether no connection is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving end of one push connection.
///
/// Dropping it removes the connection from the hub.
pub struct Subscription {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Bytes>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// This connection's identifier.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next framed message.
    ///
    /// Returns `None` once the hub has dropped this connection.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Turn the subscription into a body stream for an HTTP response.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|frame| (Ok::<_, Infallible>(frame), sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Frame a message for the event-stream wire format.
///
/// Every line becomes a `data: ` record and a blank line ends the event.
pub fn frame(message: &str) -> Bytes {
    let mut out = String::with_capacity(message.len().saturating_add(8));
    for line in message.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    Bytes::from(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frames_single_line() {
        assert_eq!(frame(r#"{"type":"x"}"#), Bytes::from("data: {\"type\":\"x\"}\n\n"));
    }

    #[test]
    fn frames_each_line_separately() {
        assert_eq!(frame("a\r\nb\nc"), Bytes::from("data: a\ndata: b\ndata: c\n\n"));
        assert_eq!(frame(""), Bytes::from("data: \n\n"));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection_identically() {
        let hub = BroadcastHub::default();
        let mut subs: Vec<_> = (0..4).map(|_| hub.register()).collect();

        assert_eq!(hub.broadcast(r#"{"type":"x"}"#), 4);
        for sub in &mut subs {
            assert_eq!(sub.recv().await.unwrap(), frame(r#"{"type":"x"}"#));
        }
    }

    #[tokio::test]
    async fn closed_connection_is_skipped_without_error() {
        let hub = BroadcastHub::default();
        let mut a = hub.register();
        let b = hub.register();
        let mut c = hub.register();
        assert_eq!(hub.len(), 3);

        drop(b);
        assert_eq!(hub.len(), 2);

        assert_eq!(hub.broadcast(r#"{"type":"x"}"#), 2);
        assert_eq!(a.recv().await.unwrap(), frame(r#"{"type":"x"}"#));
        assert_eq!(c.recv().await.unwrap(), frame(r#"{"type":"x"}"#));
    }

    #[tokio::test]
    async fn snapshot_precedes_later_broadcasts() {
        let hub = BroadcastHub::default();
        let mut sub = hub.register_with(r#"{"type":"all","videos":[]}"#);
        hub.broadcast(r#"{"type":"x"}"#);

        assert_eq!(sub.recv().await.unwrap(), frame(r#"{"type":"all","videos":[]}"#));
        assert_eq!(sub.recv().await.unwrap(), frame(r#"{"type":"x"}"#));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_goes_only_to_the_new_connection() {
        let hub = BroadcastHub::default();
        let mut old = hub.register();
        let _new = hub.register_with("snapshot");

        assert!(old.rx.try_recv().is_err());
        hub.broadcast("x");
        assert_eq!(old.recv().await.unwrap(), frame("x"));
    }

    #[tokio::test]
    async fn slow_reader_keeps_every_frame() {
        let hub = BroadcastHub::new();
        let mut slow = hub.register();

        for n in 0..500 {
            assert_eq!(hub.broadcast(&format!("line {n}")), 1);
        }
        assert_eq!(hub.len(), 1);

        for n in 0..500 {
            assert_eq!(slow.recv().await.unwrap(), frame(&format!("line {n}")));
        }
        assert_eq!(hub.broadcast("done"), 1);
        assert_eq!(slow.recv().await.unwrap(), frame("done"));
    }

    #[tokio::test]
    async fn connection_whose_receiver_is_gone_is_pruned() {
        let hub = BroadcastHub::new();
        let mut sub = hub.register();
        // Close the receiving half while the entry is still registered.
        sub.rx.close();
        assert_eq!(hub.len(), 1);

        assert_eq!(hub.broadcast("x"), 0);
        assert!(hub.is_empty());
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn removal_is_idempotent() {
        let hub = BroadcastHub::default();
        let sub = hub.register();
        let id = sub.id();

        assert!(hub.remove(id));
        assert!(!hub.remove(id));
        drop(sub);
        assert!(hub.is_empty());
    }

    #[test]
    fn subscription_outliving_hub_drops_cleanly() {
        let hub = BroadcastHub::default();
        let sub = hub.register();
        drop(hub);
        drop(sub);
    }

    #[test]
    fn broadcast_without_connections_is_a_no_op() {
        let hub = BroadcastHub::default();
        assert_eq!(hub.broadcast("x"), 0);
    }
}
