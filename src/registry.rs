//! Client registry
//!
//! Live mapping from client ID to client handle. Owned by the dispatch loop;
//! nothing else mutates it.

use std::collections::HashMap;

use crate::client::Client;
use crate::types::ClientId;

/// Registry of connected clients
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Register a client under its own ID, replacing any previous entry
    pub fn insert(&mut self, client: Client) -> Option<Client> {
        self.clients.insert(client.id.clone(), client)
    }

    pub fn remove(&mut self, id: &ClientId) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Look up a client, handing back an owned handle
    pub fn get(&self, id: &ClientId) -> Option<Client> {
        self.clients.get(id).cloned()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClientId> {
        self.clients.keys()
    }
}
