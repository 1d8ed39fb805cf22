//! Readiness polling

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::cluster::ClusterGateway;
use crate::errors::DeployError;

/// Readiness polling options
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    /// Upper bound for the whole wait
    pub timeout: Duration,

    /// Delay between status reads
    pub interval: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(3),
        }
    }
}

/// Poll a workload until its available replicas match the desired count.
///
/// Only a "not ready yet" status is retried. Errors from the gateway are
/// returned immediately. The last poll happens at the deadline.
pub async fn wait_for_ready<S, F>(
    gateway: &dyn ClusterGateway,
    namespace: &str,
    name: &str,
    options: &ReadinessOptions,
    sleep_fn: S,
) -> Result<(), DeployError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let started = Instant::now();

    loop {
        let status = gateway.read_workload_status(namespace, name).await?;
        if status.is_ready() {
            info!(
                "Deployment '{}' is ready with {} replicas",
                name, status.available_replicas
            );
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(DeployError::ReadinessTimeout {
                workload: name.to_string(),
                timeout: options.timeout,
            });
        }

        debug!(
            "Waiting for deployment '{}' to be ready... ({}/{} replicas available)",
            name, status.available_replicas, status.desired_replicas
        );
        sleep_fn(options.interval.min(options.timeout - elapsed)).await;
    }
}
