pub mod config;
pub mod db;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod models;
pub mod opportunity;
pub mod pagination;
pub mod recorder;
pub mod schema;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod templates;
pub mod translate;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the parcel query service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}
