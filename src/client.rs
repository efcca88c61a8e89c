//! Client handle and connect event
//!
//! A `Client` is the handle handlers and the registry hold for one connected
//! peer. A `Connection` is what the listener publishes when a peer arrives.

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::types::ClientId;

/// Connected client handle
///
/// Cheap to clone: the ID, the sending half of the peer's outbound line
/// channel and the token that stops its receive loop. The socket writer task
/// owns the receiving half.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Outbound line channel (drained by the writer task)
    sender: mpsc::Sender<String>,
    /// Cancelled when the dispatcher closes this client
    closing: CancellationToken,
}

impl Client {
    /// Create a new client with the given ID and outbound channel
    pub fn new(id: ClientId, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            sender,
            closing: CancellationToken::new(),
        }
    }

    /// Stop the receive loop; no further lines from this peer are published
    pub fn close(&self) {
        self.closing.cancel();
    }

    /// Whether `close` has been called on any clone of this handle
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Token the receive loop watches
    pub fn closing_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// Queue a line for this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender
            .send(line.into())
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Whether the writer side of this client has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// New-client event
///
/// Carries the client handle and its receive procedure. The dispatcher
/// starts `receive` as a detached task once the client is registered.
pub struct Connection {
    pub client: Client,
    pub receive: BoxFuture<'static, ()>,
}

impl Connection {
    pub fn new(client: Client, receive: BoxFuture<'static, ()>) -> Self {
        Self { client, receive }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
