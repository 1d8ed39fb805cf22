//! Deployment status notifications

pub mod bus;
pub mod observer;

pub use bus::NotificationBus;
pub use observer::{ChannelObserver, Observer, ObserverMessage};
