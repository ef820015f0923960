//! Broadcast of wallet events to any number of subscribers.
//!
//! Sync, building and propagation emit [`WalletEvent`](crate::events::WalletEvent)s
//! through an [`EventBus`]. Late subscribers do not see past events, and a
//! subscriber that falls more than `capacity` events behind loses the oldest.

use thiserror::Error;
use tokio::sync::broadcast;

const DEFAULT_EVENT_LIMIT: usize = 10000;

/// Event receive errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Receiver lagged behind by {0} events")]
    Lagged(u64),

    #[error("Event bus closed")]
    Closed,
}

/// Cloneable sending side of a broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
        }
    }

    pub fn subscribe(&self) -> EventReceiver<T> {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: T) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LIMIT)
    }
}

#[derive(Debug)]
pub struct EventReceiver<T: Clone> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> EventReceiver<T> {
    pub async fn recv(&mut self) -> Result<T, EventError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => EventError::Lagged(n),
            broadcast::error::RecvError::Closed => EventError::Closed,
        })
    }

    /// Next buffered event, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit("block applied");

        assert_eq!(rx.recv().await.unwrap(), "block applied");
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(1u32);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_receiver() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5u32 {
            bus.emit(i);
        }
        assert_eq!(rx.recv().await, Err(EventError::Lagged(3)));
        assert_eq!(rx.recv().await, Ok(3));
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = EventBus::<u32>::new(2);
        let mut rx = bus.subscribe();
        drop(bus);
        assert_eq!(rx.recv().await, Err(EventError::Closed));
    }
}
