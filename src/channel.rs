use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{ChannelEvent, OutboundRequest};

/// Transport-level failures. Everything else in the core is absorbed or
/// surfaced as a notice; only these cross the channel boundary.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed event from backend: {0}")]
    Protocol(String),

    #[error("channel closed")]
    Closed,
}

/// The real-time transport the reconciliation core talks to.
///
/// Injected as an explicit dependency — the core never reaches for an
/// ambient connection. `send` must not block the host event loop;
/// implementations hand the request to a background task.
pub trait Channel {
    /// Hand an outbound request to the transport.
    fn send(&self, request: OutboundRequest) -> Result<(), ChannelError>;

    /// Acquire a subscription to inbound events. Dropping the returned
    /// `Subscription` (or calling `unsubscribe`) releases it.
    fn subscribe(&self) -> Subscription;
}

type SubscriberMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>>>;

fn lock_subscribers(map: &SubscriberMap) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>> {
    // recover the map on poisoning; subscriber bookkeeping has no
    // invariants a panicked publisher could have broken mid-update
    map.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fan-out registry shared by channel implementations: every published
/// event is delivered to all live subscriptions in publish order.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: SubscriberMap,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its disposer handle.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_subscribers(&self.subscribers).insert(id, tx);
        Subscription {
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
            active: true,
        }
    }

    /// Deliver an event to every live subscriber, pruning closed ones.
    pub fn publish(&self, event: ChannelEvent) {
        let mut subs = lock_subscribers(&self.subscribers);
        subs.retain(|id, tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(subscriber = id, "pruning closed subscriber");
            }
            delivered
        });
    }

    pub fn subscriber_count(&self) -> usize {
        lock_subscribers(&self.subscribers).len()
    }
}

/// Scoped acquisition of an event subscription.
///
/// `unsubscribe` is idempotent and also runs on drop, so a subscription
/// can never outlive its session by accident.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    subscribers: SubscriberMap,
    active: bool,
}

impl Subscription {
    /// Non-blocking poll for the next queued event.
    pub fn try_next(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }

    /// Await the next event; `None` once unsubscribed and drained.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Release the subscription. Safe to call repeatedly.
    pub fn unsubscribe(&mut self) {
        if self.active {
            self.active = false;
            lock_subscribers(&self.subscribers).remove(&self.id);
            self.rx.close();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// In-process channel: requests are recorded, events are injected by the
/// caller. Backs the test suite and offline runs.
#[derive(Clone, Default)]
pub struct LoopbackChannel {
    registry: SubscriberRegistry,
    sent: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests handed to `send`, in order.
    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Inject an inbound event, as if the backend had pushed it.
    pub fn emit(&self, event: ChannelEvent) {
        self.registry.publish(event);
    }
}

impl Channel for LoopbackChannel {
    fn send(&self, request: OutboundRequest) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }
}
