//! Minimal TCP Connection Multiplexer Library
//!
//! Accepts TCP clients, reads line-oriented directed messages and dispatches
//! connect/message/close callbacks to a pluggable `Handler`, while keeping a
//! live registry of connected clients.
//!
//! # Wire grammar
//! One message per line: `DIRECTIVE:CONTENT`, split at the first colon.
//! - `CLOSE:<id>` closes client `<id>` if registered
//! - `<id>:<content>` delivers `<content>` to client `<id>`
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Dispatcher` is the single owner of the registry and runs the loop
//! - The `Listener` and each client's receive task only send events
//! - Handler callbacks run detached on a bounded `CallbackPool`
//!
//! # Example
//! ```ignore
//! use tcp_mux::{Config, Dispatcher, RelayHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tcp_mux::AppError> {
//!     let config = Config::default();
//!     Dispatcher::new(RelayHandler, &config).start(config.port).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod pool;
pub mod registry;
pub mod relay;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, Connection};
pub use config::Config;
pub use error::{AppError, HandlerError, HandlerResult, ParseError, SendError};
pub use handler::Handler;
pub use listener::{EventSinks, Listener};
pub use message::Directive;
pub use pool::CallbackPool;
pub use registry::ClientRegistry;
pub use relay::RelayHandler;
pub use server::Dispatcher;
pub use types::ClientId;
