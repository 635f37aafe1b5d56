//! Notification hub for live task updates.
//!
//! Subscribers receive every broadcast batch as a serialized JSON array of
//! [`TaskSnapshot`]s. Delivery goes through an unbounded channel per
//! subscriber, so a slow or dead connection never holds up the others: a
//! failed send simply drops that subscriber from the set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::TaskSnapshot;

/// Unique identifier of a subscriber connection.
pub type SubscriberId = u64;

/// A live subscription: the receiving half of one subscriber's feed.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: UnboundedReceiver<String>,
}

/// Fan-out of task snapshot batches to every subscriber.
#[derive(Debug)]
pub struct NotificationHub {
    subscribers: Mutex<HashMap<SubscriberId, UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, sender);

        tracing::debug!(subscriber = id, "Subscriber connected");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = id, "Subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver one batch to every current subscriber.
    ///
    /// Returns the number of subscribers the batch was handed to.
    pub fn broadcast(&self, batch: &[TaskSnapshot]) -> usize {
        let targets: Vec<(SubscriberId, UnboundedSender<String>)> = {
            let subscribers = self.subscribers.lock();
            if subscribers.is_empty() {
                return 0;
            }
            subscribers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let payload = match serde_json::to_string(batch) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize task batch");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            tracing::debug!(subscriber = id, "Delivery failed, dropping subscriber");
            self.unsubscribe(id);
        }

        delivered
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
