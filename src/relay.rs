//! Relay handler
//!
//! The handler the binary runs: greets each peer with its assigned ID and
//! forwards delivered content to the addressed client.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::Client;
use crate::error::HandlerResult;
use crate::handler::Handler;
use crate::types::ClientId;

/// Prefix of the greeting line sent on connect (`ID:<client id>`)
pub const GREETING_PREFIX: &str = "ID:";

/// Forwards `<id>:<content>` lines to client `<id>`
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayHandler;

#[async_trait]
impl Handler for RelayHandler {
    async fn on_connect(&self, client: Client) -> HandlerResult {
        client
            .send(format!("{GREETING_PREFIX}{}", client.id))
            .await?;
        Ok(())
    }

    async fn on_message(&self, client: Option<Client>, content: String) -> HandlerResult {
        let Some(client) = client else {
            debug!("No recipient, dropping {} bytes", content.len());
            return Ok(());
        };

        client.send(content).await?;
        Ok(())
    }

    async fn on_close(&self, client_id: ClientId) -> HandlerResult {
        info!(client_id = %client_id, "Client left");
        Ok(())
    }
}
