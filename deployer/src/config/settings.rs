//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::ServiceType;
use crate::deploy::readiness::ReadinessOptions;
use crate::deploy::{EngineSettings, PortForwardOptions};
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::{LogLevel, LogOptions};

/// Engine settings, read from a JSON file. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Readiness polling configuration
    #[serde(default)]
    pub readiness: ReadinessSettings,

    /// Port forwarding configuration
    #[serde(default)]
    pub port_forward: PortForwardSettings,

    /// Type of the service created in front of each workload
    #[serde(default)]
    pub service_type: ServiceType,

    /// Artificial delay of the validation step
    #[serde(default)]
    pub validation_delay_ms: u64,

    /// Disconnect observers once their deployment is terminal
    #[serde(default = "default_true")]
    pub close_observers_on_terminal: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            readiness: ReadinessSettings::default(),
            port_forward: PortForwardSettings::default(),
            service_type: ServiceType::default(),
            validation_delay_ms: 0,
            close_observers_on_terminal: true,
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it does not exist.
    ///
    /// Runs before logging is initialized, so whether the file was found is
    /// returned alongside the settings for the caller to log.
    pub async fn load(file: &File) -> Result<(Self, bool), DeployError> {
        if !file.exists().await {
            return Ok((Self::default(), false));
        }
        let settings: Settings = file.read_json().await?;
        settings.check()?;
        Ok((settings, true))
    }

    /// Reject values the engine cannot work with
    pub fn check(&self) -> Result<(), DeployError> {
        if self.port_forward.port_range_start >= self.port_forward.port_range_end {
            return Err(DeployError::ConfigError(format!(
                "Empty port forward range {}..{}",
                self.port_forward.port_range_start, self.port_forward.port_range_end
            )));
        }
        if self.readiness.interval_ms == 0 {
            return Err(DeployError::ConfigError(
                "Readiness interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            json_format: self.log_json,
            ..Default::default()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            readiness: ReadinessOptions {
                timeout: Duration::from_millis(self.readiness.timeout_ms),
                interval: Duration::from_millis(self.readiness.interval_ms),
            },
            port_forward: PortForwardOptions {
                kubectl_path: self.port_forward.kubectl_path.clone(),
                port_range: self.port_forward.port_range_start..self.port_forward.port_range_end,
                local_host: self.port_forward.local_host.clone(),
            },
            service_type: self.service_type,
            validation_delay: Duration::from_millis(self.validation_delay_ms),
            close_observers_on_terminal: self.close_observers_on_terminal,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3001
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Readiness polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_readiness_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_readiness_interval")]
    pub interval_ms: u64,
}

fn default_readiness_timeout() -> u64 {
    30_000
}

fn default_readiness_interval() -> u64 {
    3_000
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_readiness_timeout(),
            interval_ms: default_readiness_interval(),
        }
    }
}

/// Port forwarding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortForwardSettings {
    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,

    /// First local port (inclusive)
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Last local port (exclusive)
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,

    #[serde(default = "default_local_host")]
    pub local_host: String,
}

fn default_kubectl_path() -> String {
    "kubectl".to_string()
}

fn default_port_range_start() -> u16 {
    30000
}

fn default_port_range_end() -> u16 {
    40000
}

fn default_local_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for PortForwardSettings {
    fn default() -> Self {
        Self {
            kubectl_path: default_kubectl_path(),
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            local_host: default_local_host(),
        }
    }
}
