//! Subgate Server
//!
//! Main entry point for the Subgate weighted failover proxy

use subgate_api::start_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    start_server().await?;
    Ok(())
}
