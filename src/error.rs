//! Error types for the multiplexer
//!
//! Defines application-level errors, directive parse errors, send errors and
//! the error type handler callbacks report back to the callback pool.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Raised by the listener, the per-connection tasks and config loading.
/// None of these ever reach the dispatch loop itself.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (bind, accept, socket read/write, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line framing error (line too long or underlying IO failure)
    #[error("Codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// Channel send error (dispatcher is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Directed message parse errors
///
/// Logged by the dispatcher; the offending line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `:` separates the directive from the content
    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors returned by handler callbacks
///
/// The callback pool logs these and drops them.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Writing to a client failed
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// Any other handler-specific failure
    #[error("{0}")]
    Failed(String),
}

/// Result type for handler callbacks
pub type HandlerResult = Result<(), HandlerError>;
