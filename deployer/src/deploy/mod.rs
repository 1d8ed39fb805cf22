//! Deployment engine

pub mod fsm;
pub mod orchestrator;
pub mod readiness;
pub mod registry;
pub mod validation;

pub use orchestrator::{EngineSettings, Orchestrator, PortForwardOptions};
