//! Subscription management for model updates.
//!
//! Subscribers are notified once per completed pipeline run with the
//! `ModelUpdatedEvent` and the row events the run produced.

use hashbrown::HashMap;
use rowflow_core::{ModelUpdatedEvent, RowEvent};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for update notifications.
pub type UpdateCallback = Box<dyn Fn(&ModelUpdatedEvent, &[RowEvent])>;

/// Manages the subscriptions of a row model.
pub struct SubscriptionManager {
    callbacks: HashMap<SubscriptionId, UpdateCallback>,
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModelUpdatedEvent, &[RowEvent]) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    /// Notifies every subscriber.
    pub fn notify_all(&self, event: &ModelUpdatedEvent, rows: &[RowEvent]) {
        for callback in self.callbacks.values() {
            callback(event, rows);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
