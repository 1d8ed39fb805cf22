//! Fan-out of status events to observers

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use crate::models::deployment::{Deployment, StatusEvent};
use crate::notify::observer::{Observer, CLOSE_GOING_AWAY};

type Subscribers = HashMap<String, Arc<dyn Observer>>;

/// Maps a deployment ID to the observers subscribed to it
pub struct NotificationBus {
    subscriptions: RwLock<HashMap<String, Subscribers>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe an observer. Subscribing the same observer twice is a no-op.
    pub fn subscribe(&self, deployment_id: &str, observer: Arc<dyn Observer>) {
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        subscriptions
            .entry(deployment_id.to_string())
            .or_default()
            .insert(observer.id().to_string(), observer);
        info!("Observer connected for deployment ID: {}", deployment_id);
    }

    /// Remove an observer. The set is dropped once its last observer leaves.
    pub fn unsubscribe(&self, deployment_id: &str, observer_id: &str) {
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        let Some(subscribers) = subscriptions.get_mut(deployment_id) else {
            return;
        };
        if subscribers.remove(observer_id).is_some() {
            info!("Observer disconnected for deployment ID: {}", deployment_id);
        }
        if subscribers.is_empty() {
            subscriptions.remove(deployment_id);
        }
    }

    /// Send the deployment's status to every open subscriber of its ID.
    ///
    /// Returns the number of observers the event was delivered to.
    pub fn publish(&self, deployment_id: &str, deployment: &Deployment) -> usize {
        let observers = self.observers(deployment_id);
        if observers.is_empty() {
            return 0;
        }

        let payload = match serde_json::to_string(&StatusEvent::from(deployment)) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize status for '{}': {}", deployment_id, e);
                return 0;
            }
        };

        let delivered = observers
            .iter()
            .filter(|observer| observer.is_open())
            .filter(|observer| observer.send(&payload))
            .count();
        debug!(
            "Broadcasted {:?} to {} observers for deployment ID: {}",
            deployment.state, delivered, deployment_id
        );
        delivered
    }

    /// Close every observer of a deployment and drop its set
    pub fn close_all(&self, deployment_id: &str) -> usize {
        let removed = {
            let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
            subscriptions.remove(deployment_id)
        };
        let Some(subscribers) = removed else {
            return 0;
        };

        for observer in subscribers.values() {
            observer.close(CLOSE_GOING_AWAY, "Deployment completed or failed");
        }
        info!(
            "Closed {} observers for deployment ID: {}",
            subscribers.len(),
            deployment_id
        );
        subscribers.len()
    }

    pub fn subscriber_count(&self, deployment_id: &str) -> usize {
        let subscriptions = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
        subscriptions.get(deployment_id).map(HashMap::len).unwrap_or(0)
    }

    /// Whether a subscription set exists for the ID
    pub fn has_subscriptions(&self, deployment_id: &str) -> bool {
        let subscriptions = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
        subscriptions.contains_key(deployment_id)
    }

    // Snapshot so that sends happen outside the lock
    fn observers(&self, deployment_id: &str) -> Vec<Arc<dyn Observer>> {
        let subscriptions = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
        subscriptions
            .get(deployment_id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
