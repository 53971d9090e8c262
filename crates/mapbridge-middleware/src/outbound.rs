//! Outbound message channels with observable subscriber counts.

use std::fmt;

use tokio::sync::broadcast;

/// A named, fan-out channel carrying messages out of the bridge.
///
/// Every [`subscribe`](Self::subscribe)d receiver counts as one subscriber
/// for as long as it is alive. Producers read
/// [`subscriber_count`](Self::subscriber_count) to skip building messages
/// nobody will receive.
pub struct OutboundChannel<T> {
    topic: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> OutboundChannel<T> {
    pub fn new(topic: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { topic, sender }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Hand `msg` to every current subscriber, returning how many got it.
    pub fn publish(&self, msg: T) -> usize {
        self.sender.send(msg).unwrap_or(0)
    }
}

impl<T> Clone for OutboundChannel<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic,
            sender: self.sender.clone(),
        }
    }
}

impl<T> fmt::Debug for OutboundChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundChannel")
            .field("topic", &self.topic)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
