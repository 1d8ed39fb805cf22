//! kubedeploy - Entry Point
//!
//! Serves the deployment HTTP and WebSocket API and drives deployments
//! against the cluster selected by the ambient kubeconfig.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use kubedeploy::app::options::AppOptions;
use kubedeploy::app::run::run;
use kubedeploy::cluster::KubeGateway;
use kubedeploy::config::Settings;
use kubedeploy::filesys::file::File;
use kubedeploy::logs::{init_logging, LogLevel};
use kubedeploy::process::TokioCommandRunner;
use kubedeploy::utils::version_info;

use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "kubedeploy.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let config_path = cli_args
        .get("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (mut settings, settings_found) = match Settings::load(&File::new(&config_path)).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Unable to read settings file {config_path}: {e}");
            std::process::exit(1);
        }
    };
    if let Some(level) = cli_args.get("log-level") {
        match level.parse::<LogLevel>() {
            Ok(level) => settings.log_level = level,
            Err(e) => eprintln!("{e}, keeping {:?}", settings.log_level),
        }
    }

    // Initialize logging
    let _log_guard = match init_logging(settings.log_options()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if settings_found {
        info!("Loaded settings from {}", config_path);
    } else {
        info!("Settings file {} not found, using defaults", config_path);
    }

    // Connect to the cluster
    let gateway = match KubeGateway::try_default().await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Unable to connect to the cluster: {e}");
            std::process::exit(1);
        }
    };

    let options = AppOptions::from_settings(&settings);
    info!(
        "Running kubedeploy {} with options: {:?}",
        version.version, options
    );
    let result = run(
        options,
        gateway,
        Arc::new(TokioCommandRunner),
        await_shutdown_signal(),
    )
    .await;
    if let Err(e) = result {
        error!("Failed to run kubedeploy: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
