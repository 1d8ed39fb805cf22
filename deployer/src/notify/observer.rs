//! Observers of deployment status

use tokio::sync::mpsc;

use crate::utils::generate_uuid;

/// Close code sent when a deployment reached a terminal state
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code sent when an observer asks for an unknown deployment
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Something that receives serialized status events for one deployment
pub trait Observer: Send + Sync {
    /// Stable identity, used for unsubscribe
    fn id(&self) -> &str;

    /// Whether the observer can still receive messages
    fn is_open(&self) -> bool;

    /// Deliver a serialized status event. Returns false if it could not be delivered.
    fn send(&self, payload: &str) -> bool;

    /// Tell the observer to disconnect
    fn close(&self, code: u16, reason: &str);
}

/// Message queued for a channel-backed observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverMessage {
    Status(String),
    Close { code: u16, reason: String },
}

/// Observer that queues messages on an unbounded channel.
///
/// The receiving half is owned by the transport, which writes messages to
/// the wire. Dropping the receiver closes the observer.
#[derive(Debug)]
pub struct ChannelObserver {
    id: String,
    tx: mpsc::UnboundedSender<ObserverMessage>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ObserverMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Self {
            id: generate_uuid(),
            tx,
        };
        (observer, rx)
    }
}

impl Observer for ChannelObserver {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, payload: &str) -> bool {
        self.tx
            .send(ObserverMessage::Status(payload.to_string()))
            .is_ok()
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(ObserverMessage::Close {
            code,
            reason: reason.to_string(),
        });
    }
}
