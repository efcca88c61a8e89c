//! Handler trait
//!
//! Consumer-supplied callbacks invoked by the dispatcher. Every callback runs
//! as a detached task, possibly concurrently with the others and with the
//! dispatch loop.

use async_trait::async_trait;

use crate::client::Client;
use crate::error::HandlerResult;
use crate::types::ClientId;

/// Reacts to connect, message and close events
///
/// Implementations must not block indefinitely. Errors are logged by the
/// callback pool and otherwise ignored.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// A client connected and has been registered
    async fn on_connect(&self, client: Client) -> HandlerResult;

    /// A message was routed to `client`
    ///
    /// `client` is `None` when the directive named no registered client.
    /// That is a normal case, not a failure.
    async fn on_message(&self, client: Option<Client>, content: String) -> HandlerResult;

    /// A registered client was closed and removed from the registry
    async fn on_close(&self, client_id: ClientId) -> HandlerResult;
}
