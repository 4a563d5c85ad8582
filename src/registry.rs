//! The subscriber registry: the set of live event stream subscribers and
//! the non-blocking fan-out onto their queues.
//!
//! Each subscriber owns a bounded queue. The registry keeps a sending half
//! per subscriber, keyed by an opaque [`SubscriberId`]. Registration and
//! removal take the write lock; broadcast only takes the read lock and never
//! waits on a queue, so a stalled consumer cannot hold up a producer or
//! other subscribers.

use crate::internal_metrics::Metrics;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// A serialized message as queued for a subscriber. Shared between all
/// subscribers of one broadcast.
pub type Message = Arc<str>;

/// Opaque registry key for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One stream subscriber: an identity and its bounded message queue.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Message>,
    receiver: mpsc::Receiver<Message>,
}

impl Subscriber {
    /// Creates a subscriber whose queue holds at most `capacity` pending messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. `Config::validate` rules that out.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            id: SubscriberId::next(),
            sender,
            receiver,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the subscriber has been unregistered and its
    /// queue drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    fn close(&mut self) {
        self.receiver.close();
    }
}

/// The result of offering one message to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers the message was enqueued for.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
}

/// Tracks live subscribers and fans messages out to them.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Message>>>,
    metrics: Metrics,
}

impl SubscriberRegistry {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, mpsc::Sender<Message>>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, mpsc::Sender<Message>>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the subscriber's queue to the active set.
    pub fn register(&self, subscriber: &Subscriber) {
        let active = {
            let mut subscribers = self.write();
            subscribers.insert(subscriber.id, subscriber.sender.clone());
            subscribers.len()
        };
        self.metrics.set_active_subscribers(active);
        debug!(subscriber = %subscriber.id, active, "Subscriber registered");
    }

    /// Removes the subscriber from the active set and closes its queue.
    ///
    /// Returns `true` if the subscriber was registered. The queue is closed
    /// only on that first removal; later calls are no-ops.
    pub fn unregister(&self, subscriber: &mut Subscriber) -> bool {
        let (removed, active) = {
            let mut subscribers = self.write();
            let removed = subscribers.remove(&subscriber.id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            subscriber.close();
            self.metrics.set_active_subscribers(active);
            debug!(subscriber = %subscriber.id, active, "Subscriber unregistered");
        }
        removed
    }

    /// Offers `message` to every registered subscriber without waiting.
    ///
    /// A subscriber whose queue is full misses this message; nobody else is
    /// affected.
    pub fn broadcast(&self, message: &str) -> BroadcastOutcome {
        let start = Instant::now();
        let message: Message = Arc::from(message);
        let mut outcome = BroadcastOutcome::default();

        {
            let subscribers = self.read();
            for (id, sender) in subscribers.iter() {
                match sender.try_send(Arc::clone(&message)) {
                    Ok(()) => outcome.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        trace!(subscriber = %id, "Subscriber queue full, dropping message");
                        outcome.dropped += 1;
                    }
                    // Only reachable if a queue was closed while still
                    // registered, which unregister never does.
                    Err(TrySendError::Closed(_)) => {
                        trace!(subscriber = %id, "Subscriber queue closed, skipping");
                        outcome.dropped += 1;
                    }
                }
            }
        }

        self.metrics
            .broadcast_deliveries_total
            .increment(outcome.delivered as u64);
        self.metrics
            .broadcast_dropped_total
            .increment(outcome.dropped as u64);
        self.metrics
            .broadcast_duration_seconds
            .record(start.elapsed().as_secs_f64());
        outcome
    }

    /// Returns the number of registered subscribers.
    pub fn active_count(&self) -> usize {
        self.read().len()
    }
}
