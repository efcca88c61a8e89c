//! TCP listener
//!
//! Accepts sockets, wraps each one into a `Connection` and publishes it on
//! the new-client sink. Per-client tasks publish raw lines on the
//! raw-message sink. The listener never touches the registry.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::client::Connection;
use crate::config::Config;
use crate::connection;
use crate::error::AppError;

/// The two write-only event streams feeding the dispatcher
#[derive(Debug, Clone)]
pub struct EventSinks {
    /// New-client events
    pub clients: mpsc::Sender<Connection>,
    /// Raw-message events
    pub messages: mpsc::Sender<String>,
}

impl EventSinks {
    pub fn new(clients: mpsc::Sender<Connection>, messages: mpsc::Sender<String>) -> Self {
        Self { clients, messages }
    }
}

/// Accept loop producing connect events
#[derive(Debug, Clone)]
pub struct Listener {
    sinks: EventSinks,
    host: String,
    client_buffer: usize,
}

impl Listener {
    pub fn new(sinks: EventSinks, config: &Config) -> Self {
        Self {
            sinks,
            host: config.host.clone(),
            client_buffer: config.client_buffer,
        }
    }

    pub fn sinks(&self) -> &EventSinks {
        &self.sinks
    }

    /// Bind the configured host on `port`
    pub async fn bind(&self, port: u16) -> Result<TcpListener, AppError> {
        let listener = TcpListener::bind((self.host.as_str(), port)).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Bind and accept connections until the dispatcher goes away
    pub async fn start(self, port: u16) -> Result<(), AppError> {
        let listener = self.bind(port).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound socket
    ///
    /// Accept errors are logged and skipped. Returns only when the
    /// new-client sink is closed.
    pub async fn serve(self, listener: TcpListener) -> Result<(), AppError> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let connection = connection::accept(stream, &self.sinks, self.client_buffer);
                    debug!(client_id = %connection.client.id, %addr, "Accepted connection");

                    if self.sinks.clients.send(connection).await.is_err() {
                        error!("Dispatcher closed, stopping listener");
                        return Err(AppError::ChannelSend);
                    }
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
