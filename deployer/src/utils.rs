//! Utility functions

use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Version information for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Build a deployment ID from the service name and a millisecond timestamp
pub fn deployment_id(service_name: &str, timestamp_millis: i64) -> String {
    format!("{}-{}", service_name.trim(), timestamp_millis)
}

/// Pick a pseudo-random local port in `range`
pub fn pick_local_port(range: &Range<u16>) -> u16 {
    if range.is_empty() {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
