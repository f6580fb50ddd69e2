use std::sync::Arc;

mod aave_client;
mod config;
mod error;
mod page;
mod resolver;
mod server;
mod types;
mod utils;

use crate::aave_client::AaveClient;
use crate::server::WebServer;
use crate::types::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    log::info!("[main] Starting up...");

    // Loaded once; read-only for the life of the process.
    let config = Arc::new(Config::from_env()?);
    log::info!(
        "[main] Chains: {}",
        config.markets.chains.names().join(", ")
    );

    let client = AaveClient::new(&config)?;
    let server = WebServer::new(config.clone(), Arc::new(client));

    server.run().await?;

    log::info!("[main] Server stopped. Exiting.");
    Ok(())
}
