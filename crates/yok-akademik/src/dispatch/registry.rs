//! Event subscribers per session.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a full queue
//! loses the event, a closed queue is dropped from the registry.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::SessionEvent;

/// Identifies one subscription within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub session_id: String,
    receiver: mpsc::Receiver<SessionEvent>,
}

impl Subscription {
    /// Next event; `None` once the subscription is removed.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Consume the subscription as a stream of events.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<SessionEvent> {
        ReceiverStream::new(self.receiver)
    }
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<SessionEvent>,
}

/// `session_id → subscribers`, mutated only by the coordinator.
pub struct SubscriberRegistry {
    sessions: HashMap<String, Vec<Subscriber>>,
    next_id: u64,
    capacity: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose queues hold `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { sessions: HashMap::new(), next_id: 1, capacity: capacity.max(1) }
    }

    /// Register a new queue for `session_id`.
    pub fn subscribe(&mut self, session_id: &str) -> Subscription {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let (tx, receiver) = mpsc::channel(self.capacity);
        self.sessions.entry(session_id.to_string()).or_default().push(Subscriber { id, tx });

        tracing::debug!(session_id, subscriber = %id, "Subscribed");
        Subscription { id, session_id: session_id.to_string(), receiver }
    }

    /// Remove one queue; returns whether it was registered.
    pub fn unsubscribe(&mut self, session_id: &str, id: SubscriberId) -> bool {
        let Some(subscribers) = self.sessions.get_mut(session_id) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            self.sessions.remove(session_id);
        }
        if removed {
            tracing::debug!(session_id, subscriber = %id, "Unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every queue of its session; returns how many took it.
    pub fn publish(&mut self, event: &SessionEvent) -> usize {
        let Some(subscribers) = self.sessions.get_mut(&event.session_id) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|subscriber| match subscriber.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    session_id = %event.session_id,
                    subscriber = %subscriber.id,
                    event = event.event.as_str(),
                    "Subscriber queue full, event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if subscribers.is_empty() {
            self.sessions.remove(&event.session_id);
        }
        delivered
    }

    /// Drop every queue of a session.
    pub fn remove_session(&mut self, session_id: &str) -> usize {
        self.sessions.remove(session_id).map_or(0, |subscribers| subscribers.len())
    }

    #[must_use]
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map_or(0, Vec::len)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(crate::config::limits::SUBSCRIBER_CAPACITY)
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("sessions", &self.sessions.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
