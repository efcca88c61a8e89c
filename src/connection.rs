//! Per-socket tasks
//!
//! Splits an accepted TCP stream into a line reader and a line writer.
//! The reader becomes the client's receive procedure; the writer drains the
//! client's outbound channel.

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{Client, Connection};
use crate::error::AppError;
use crate::listener::EventSinks;
use crate::message::Directive;
use crate::types::ClientId;

/// Longest inbound line accepted, in bytes
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Wrap an accepted socket into a connect event
///
/// Assigns a fresh ID and starts the writer task right away. The receive
/// procedure is returned unstarted inside the `Connection`.
pub fn accept(stream: TcpStream, sinks: &EventSinks, client_buffer: usize) -> Connection {
    let id = ClientId::new();
    let (reader, writer) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel(client_buffer.max(1));

    tokio::spawn(write_lines(id.clone(), writer, out_rx));

    let client = Client::new(id, out_tx);
    let closing = client.closing_token();
    let messages = sinks.messages.clone();
    let receive_id = client.id.clone();
    let receive = async move {
        if let Err(e) = receive_lines(receive_id.clone(), reader, messages, closing).await {
            warn!(client_id = %receive_id, error = %e, "Receive loop ended with error");
        }
    }
    .boxed();

    Connection::new(client, receive)
}

/// Forward every inbound line verbatim to the raw-message sink
///
/// When the peer hangs up (or the read fails) a `CLOSE:<id>` line is
/// published so the client leaves the registry through the normal close
/// path. Once `closing` is cancelled the loop stops at once and publishes
/// nothing more, not even the `CLOSE` line.
pub async fn receive_lines<R>(
    id: ClientId,
    reader: R,
    messages: mpsc::Sender<String>,
    closing: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut result = Ok(());

    loop {
        let line = tokio::select! {
            biased;
            _ = closing.cancelled() => {
                debug!(client_id = %id, "Closed by dispatcher, ending receive loop");
                return Ok(());
            }
            line = lines.next() => line,
        };
        let Some(line) = line else {
            break;
        };

        match line {
            Ok(line) => {
                let sent = tokio::select! {
                    biased;
                    _ = closing.cancelled() => {
                        debug!(client_id = %id, "Closed by dispatcher, ending receive loop");
                        return Ok(());
                    }
                    sent = messages.send(line) => sent,
                };
                if sent.is_err() {
                    debug!(client_id = %id, "Dispatcher closed, ending receive loop");
                    return Err(AppError::ChannelSend);
                }
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(client_id = %id, "Dropping line over {} bytes", MAX_LINE_LENGTH);
            }
            Err(e) => {
                result = Err(e.into());
                break;
            }
        }
    }

    debug!(client_id = %id, "Peer hung up");
    messages
        .send(Directive::Close(id).to_string())
        .await
        .map_err(|_| AppError::ChannelSend)?;
    result
}

/// Drain the outbound channel to the socket, one line per message
///
/// Ends when every `Client` handle is dropped or the socket write fails.
pub async fn write_lines<W>(id: ClientId, writer: W, mut outbound: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    while let Some(line) = outbound.recv().await {
        if let Err(e) = sink.send(line).await {
            debug!(client_id = %id, error = %e, "Socket write failed, ending write task");
            break;
        }
    }

    let _ = SinkExt::<String>::close(&mut sink).await;
    debug!(client_id = %id, "Write task ended");
}
