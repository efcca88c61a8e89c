//! TCP Multiplexer - Entry Point
//!
//! Loads configuration, then runs the dispatcher with the relay handler.

use std::env;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tcp_mux::{Config, Dispatcher, RelayHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_mux=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_mux=info")),
        )
        .init();

    // Optional JSON config via TCP_MUX_CONFIG, port from the command line
    let config = Config::from_env()?;
    let port = match env::args().nth(1) {
        Some(port) => port.parse::<u16>()?,
        None => config.port,
    };

    info!("Starting multiplexer on {}:{}", config.host, port);

    Dispatcher::new(RelayHandler, &config).start(port).await?;

    Ok(())
}
