//! Replay-last-value state channel backed by `tokio::sync::watch`.

use tokio::sync::watch;

/// A single-value publish/subscribe channel.
///
/// Every subscriber observes the latest value on subscribe and is notified
/// of every subsequent change. Publishing never blocks and never fails,
/// even with zero subscribers.
#[derive(Debug)]
pub struct StateChannel<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone> StateChannel<T> {
    /// Create a channel holding `initial`.
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Publish a new value to all current and future subscribers.
    pub fn publish(&self, value: T) {
        // send_replace never fails: the sender keeps the value alive even
        // with no receivers.
        self.sender.send_replace(value);
    }

    /// The value most recently published.
    pub fn latest(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Subscribe; the receiver starts at the latest value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone + Default> Default for StateChannel<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_latest_value_on_subscribe() {
        let channel = StateChannel::new(0u32);
        channel.publish(7);

        let rx = channel.subscribe();
        assert_eq!(*rx.borrow(), 7);
    }

    #[tokio::test]
    async fn subscriber_observes_subsequent_changes() {
        let channel = StateChannel::new(false);
        let mut rx = channel.subscribe();

        channel.publish(true);
        rx.changed().await.expect("sender alive");
        assert!(*rx.borrow());
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let channel = StateChannel::new(String::new());
        channel.publish("lonely".to_string());
        assert_eq!(channel.latest(), "lonely");
    }

    #[tokio::test]
    async fn late_subscriber_skips_intermediate_values() {
        let channel = StateChannel::new(1);
        channel.publish(2);
        channel.publish(3);

        // Replay-last, not replay-all.
        let rx = channel.subscribe();
        assert_eq!(*rx.borrow(), 3);
    }
}
