//! Typed publish/subscribe channels.
//!
//! Each manager that broadcasts state changes owns an [`EventChannel`] with
//! a concrete payload type. Subscribers hold an [`EventSubscription`] which
//! unsubscribes explicitly via [`EventSubscription::unsubscribe`] or
//! implicitly on drop. Publishing never blocks and never fails: a channel
//! with no subscribers simply drops the event.

use tokio::sync::broadcast;

/// Default buffered capacity per subscriber.
///
/// Slow subscribers that fall more than this many events behind start
/// losing the oldest events (`Lagged` on the broadcast receiver).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A typed broadcast channel owned by a manager.
#[derive(Debug)]
pub struct EventChannel<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> EventChannel<T> {
    /// Create a channel with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel with an explicit per-subscriber capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: T) {
        // A send error only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> EventSubscription<T> {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle representing one subscription to an [`EventChannel`].
#[derive(Debug)]
pub struct EventSubscription<T: Clone> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> EventSubscription<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the channel is closed. Events missed while the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for a pending event.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Explicitly end this subscription.
    ///
    /// Equivalent to dropping the handle; provided so call sites can make
    /// the unsubscribe visible.
    pub fn unsubscribe(self) {}
}
