use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RelayError;

/// Unique identifier for a subscription
pub type SubscriberId = Uuid;

/// Receiving half handed to one connection
pub struct Subscription<M> {
    id: SubscriberId,
    receiver: mpsc::Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message; `None` once the subscription is cancelled
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Publish group with per-subscriber bounded queues.
///
/// Publishing never waits on a subscriber: a full or closed queue costs that
/// subscriber the message and nothing else.
#[derive(Clone)]
pub struct BroadcastHub<M> {
    name: &'static str,
    subscribers: Arc<RwLock<HashMap<SubscriberId, mpsc::Sender<M>>>>,
    buffer: usize,
}

impl<M: Clone + Send + 'static> BroadcastHub<M> {
    pub fn new(name: &'static str, buffer: usize) -> Self {
        Self {
            name,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> Subscription<M> {
        self.subscribe_with(|| None)
    }

    /// Register a subscriber, queueing the `on_connect` message first.
    ///
    /// The greeting is built and queued while the hub is locked against
    /// publishers, so nothing published later can overtake it.
    pub fn subscribe_with<F>(&self, on_connect: F) -> Subscription<M>
    where
        F: FnOnce() -> Option<M>,
    {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.buffer);

        let mut subscribers = self.subscribers.write();
        if let Some(greeting) = on_connect() {
            // fresh channel with capacity >= 1, cannot be full
            let _ = sender.try_send(greeting);
        }
        subscribers.insert(id, sender);
        debug!("{} hub: subscriber {} joined", self.name, id);

        Subscription { id, receiver }
    }

    /// Cancel a subscription. No delivery is attempted once this returns.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            debug!("{} hub: subscriber {} left", self.name, id);
        }
        removed
    }

    /// Offer `message` to every open subscription
    pub fn publish(&self, message: M) -> PublishReport {
        let subscribers = self.subscribers.read();
        let mut report = PublishReport::default();

        for (id, sender) in subscribers.iter() {
            match sender.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.dropped += 1;
                    let err = RelayError::SubscriberDeliveryFailure {
                        subscriber: id.to_string(),
                        reason: "queue full".to_string(),
                    };
                    warn!("{} hub: {}", self.name, err);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    debug!("{} hub: subscriber {} already closed", self.name, id);
                }
            }
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let hub = BroadcastHub::new("test", 8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let report = hub.publish(1u32);
        assert_eq!(report, PublishReport { delivered: 2, dropped: 0 });
        assert_eq!(a.try_recv(), Some(1));
        assert_eq!(b.try_recv(), Some(1));
    }

    #[test]
    fn test_greeting_precedes_later_publishes() {
        let hub = BroadcastHub::new("test", 8);
        hub.publish("before");

        let mut sub = hub.subscribe_with(|| Some("hello"));
        hub.publish("after");

        assert_eq!(sub.try_recv(), Some("hello"));
        assert_eq!(sub.try_recv(), Some("after"));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let hub = BroadcastHub::new("test", 1);
        let _stuck = hub.subscribe();
        let mut live = hub.subscribe();

        assert_eq!(hub.publish(1).dropped, 0);
        assert_eq!(live.try_recv(), Some(1));

        let report = hub.publish(2);
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(live.try_recv(), Some(2));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = BroadcastHub::new("test", 8);
        let mut sub = hub.subscribe();
        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));

        assert_eq!(hub.publish(5).delivered, 0);
        assert_eq!(sub.try_recv(), None);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_is_isolated() {
        let hub = BroadcastHub::new("test", 8);
        let gone = hub.subscribe();
        let mut live = hub.subscribe();
        drop(gone);

        let report = hub.publish(9);
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(live.try_recv(), Some(9));
        // pruning happens only on explicit unsubscribe
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_unsubscribe_and_publish() {
        let hub = BroadcastHub::new("test", 1024);
        let subs: Vec<_> = (0..32).map(|_| hub.subscribe()).collect();

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..500u32 {
                    hub.publish(i);
                    tokio::task::yield_now().await;
                }
            })
        };

        for sub in &subs {
            hub.unsubscribe(sub.id());
            tokio::task::yield_now().await;
        }
        publisher.await.unwrap();

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(0).delivered, 0);
    }
}
