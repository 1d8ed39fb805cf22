//! kubedeploy
//!
//! Provisions a containerized workload onto a Kubernetes cluster (namespace,
//! deployment, service, local port-forward) and streams every state change
//! of the deployment to subscribed observers.

pub mod app;
pub mod cluster;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod notify;
pub mod process;
pub mod server;
pub mod utils;
