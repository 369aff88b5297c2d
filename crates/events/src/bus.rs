//! Ordered fan-out bus backed by a `tokio::sync::broadcast` channel.
//!
//! One [`Fanout`] exists per room: every subscriber independently receives
//! every published message, in publish order. Since a single room task is
//! the only publisher, subscribers observe mutations in exactly the order
//! the room applied them.

use tokio::sync::broadcast;

/// Default buffer capacity per fan-out channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process ordered fan-out hub.
///
/// When the buffer is full, the oldest un-consumed messages are dropped
/// and slow receivers observe `RecvError::Lagged`; such a receiver must
/// rejoin with a fresh snapshot.
#[derive(Debug)]
pub struct Fanout<M: Clone> {
    sender: broadcast::Sender<M>,
}

impl<M: Clone> Fanout<M> {
    /// Create a fan-out with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers.
    ///
    /// With zero subscribers the message is silently dropped; the
    /// authoritative state does not depend on anyone listening.
    pub fn publish(&self, message: M) {
        let _ = self.sender.send(message);
    }

    /// Subscribe to all messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<M: Clone> Default for Fanout<M> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_every_message() {
        let fanout = Fanout::default();
        let mut rx1 = fanout.subscribe();
        let mut rx2 = fanout.subscribe();

        fanout.publish("hello");

        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn messages_arrive_in_publish_order() {
        let fanout = Fanout::default();
        let mut rx = fanout.subscribe();

        for i in 0..10 {
            fanout.publish(i);
        }
        for expected in 0..10 {
            assert_eq!(rx.recv().await.unwrap(), expected);
        }
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let fanout = Fanout::default();
        fanout.publish(42);
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_only_sees_messages_after_subscribe() {
        let fanout = Fanout::default();
        fanout.publish(1);

        let mut rx = fanout.subscribe();
        fanout.publish(2);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }
}
