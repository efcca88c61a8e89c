//! Dispatcher implementation
//!
//! The single owner of the client registry. Merges the new-client and
//! raw-message streams in one loop, parses directives, updates the registry
//! and hands callbacks to the callback pool. No locks: only this loop reads
//! or writes the registry.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::{Client, Connection};
use crate::config::Config;
use crate::error::AppError;
use crate::handler::Handler;
use crate::listener::{EventSinks, Listener};
use crate::message::{Directive, CLOSE_DIRECTIVE};
use crate::pool::CallbackPool;
use crate::registry::ClientRegistry;
use crate::types::ClientId;

/// One event taken off either input stream
#[derive(Debug)]
enum Event {
    Connect(Connection),
    Message(String),
}

/// The dispatch loop and everything it owns
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
    /// All connected clients: ClientId -> Client
    registry: ClientRegistry,
    pool: CallbackPool,
    listener: Listener,
    clients: mpsc::Receiver<Connection>,
    messages: mpsc::Receiver<String>,
}

impl<H: Handler> Dispatcher<H> {
    /// Create a dispatcher and the listener wired to its two input streams
    pub fn new(handler: H, config: &Config) -> Self {
        let (client_tx, client_rx) = mpsc::channel(config.event_buffer.max(1));
        let (msg_tx, msg_rx) = mpsc::channel(config.event_buffer.max(1));
        let sinks = EventSinks::new(client_tx, msg_tx);

        Self {
            handler: Arc::new(handler),
            registry: ClientRegistry::new(),
            pool: CallbackPool::new(config.max_in_flight),
            listener: Listener::new(sinks, config),
            clients: client_rx,
            messages: msg_rx,
        }
    }

    /// Clones of the event sinks, for producers other than the listener
    pub fn sinks(&self) -> EventSinks {
        self.listener.sinks().clone()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Bind `port`, launch the listener and run the loop
    ///
    /// Only a bind failure returns; otherwise this never completes.
    pub async fn start(self, port: u16) -> Result<(), AppError> {
        let socket = self.listener.bind(port).await?;
        self.serve(socket).await
    }

    /// Launch the listener on a bound socket and run the loop
    pub async fn serve(mut self, socket: TcpListener) -> Result<(), AppError> {
        let listener = self.listener.clone();
        tokio::spawn(async move {
            if let Err(e) = listener.serve(socket).await {
                error!("Listener stopped: {}", e);
            }
        });

        self.run().await;
        Ok(())
    }

    /// Run the loop with no shutdown signal
    pub async fn run(&mut self) {
        self.run_until(std::future::pending()).await;
    }

    /// Run the loop until `shutdown` resolves
    ///
    /// Callbacks already handed to the pool keep running after return.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Dispatcher started");

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Some(connection) = self.clients.recv() => Event::Connect(connection),
                Some(raw) = self.messages.recv() => Event::Message(raw),
            };
            self.handle_event(event);
        }

        info!(clients = self.registry.len(), "Dispatcher stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connect(connection) => self.handle_connect(connection),
            Event::Message(raw) => self.handle_message(raw),
        }
    }

    /// Register the client, then detach `on_connect` and the receive loop
    ///
    /// Registration comes first so that any message processed after this
    /// event can resolve the new client.
    fn handle_connect(&mut self, connection: Connection) {
        let Connection { client, receive } = connection;
        info!(client_id = %client.id, "Client connected");

        if let Some(replaced) = self.registry.insert(client.clone()) {
            warn!(client_id = %client.id, "Replaced a registered client with the same ID");
            replaced.close();
        }

        let handler = Arc::clone(&self.handler);
        self.pool
            .spawn("on_connect", async move { handler.on_connect(client).await });
        tokio::spawn(receive);

        debug!("Total clients: {}", self.registry.len());
    }

    fn handle_message(&mut self, raw: String) {
        let directive = match Directive::parse(&raw) {
            Ok(directive) => directive,
            Err(e) => {
                warn!("Dropping malformed message: {}", e);
                return;
            }
        };

        let (target, content) = match directive {
            Directive::Close(id) => {
                if let Some(client) = self.registry.remove(&id) {
                    // Stop the peer's receive loop so it publishes nothing more
                    client.close();
                    self.dispatch_close(id);
                    return;
                }
                // Unknown close target: route like any other directive
                debug!(client_id = %id, "CLOSE for unregistered client");
                (ClientId::from(CLOSE_DIRECTIVE), id.into_string())
            }
            Directive::Deliver { target, content } => (target, content),
        };

        let client = self.registry.get(&target);
        if client.is_none() {
            debug!(client_id = %target, "No registered client for directive");
        }
        self.dispatch_message(client, content);
    }

    fn dispatch_close(&self, id: ClientId) {
        info!(client_id = %id, "Client closed");
        debug!("Total clients: {}", self.registry.len());

        let handler = Arc::clone(&self.handler);
        self.pool
            .spawn("on_close", async move { handler.on_close(id).await });
    }

    fn dispatch_message(&self, client: Option<Client>, content: String) {
        let handler = Arc::clone(&self.handler);
        self.pool.spawn("on_message", async move {
            handler.on_message(client, content).await
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::FutureExt;
    use tokio::sync::oneshot;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::error::HandlerResult;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Connect(ClientId),
        Message(Option<ClientId>, String),
        Close(ClientId),
    }

    struct Recorder {
        calls: mpsc::UnboundedSender<Call>,
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn on_connect(&self, client: Client) -> HandlerResult {
            let _ = self.calls.send(Call::Connect(client.id));
            Ok(())
        }

        async fn on_message(&self, client: Option<Client>, content: String) -> HandlerResult {
            let _ = self.calls.send(Call::Message(client.map(|c| c.id), content));
            Ok(())
        }

        async fn on_close(&self, client_id: ClientId) -> HandlerResult {
            let _ = self.calls.send(Call::Close(client_id));
            Ok(())
        }
    }

    fn dispatcher() -> (Dispatcher<Recorder>, mpsc::UnboundedReceiver<Call>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Dispatcher::new(Recorder { calls: tx }, &Config::default()), rx)
    }

    fn connection(id: &str) -> Connection {
        let (tx, _rx) = mpsc::channel(1);
        Connection::new(Client::new(ClientId::from(id), tx), async {}.boxed())
    }

    async fn next_call(rx: &mut mpsc::UnboundedReceiver<Call>) -> Call {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a callback")
            .expect("recorder dropped")
    }

    async fn assert_no_calls(rx: &mut mpsc::UnboundedReceiver<Call>) {
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    /// Connect `id` and wait for its on_connect callback
    async fn connect(
        dispatcher: &mut Dispatcher<Recorder>,
        rx: &mut mpsc::UnboundedReceiver<Call>,
        id: &str,
    ) {
        dispatcher.handle_event(Event::Connect(connection(id)));
        assert_eq!(next_call(rx).await, Call::Connect(ClientId::from(id)));
    }

    fn message(dispatcher: &mut Dispatcher<Recorder>, raw: &str) {
        dispatcher.handle_event(Event::Message(raw.to_string()));
    }

    #[tokio::test]
    async fn test_connect_registers_client() {
        let (mut dispatcher, mut rx) = dispatcher();

        connect(&mut dispatcher, &mut rx, "A").await;

        assert!(dispatcher.registry().contains(&ClientId::from("A")));
        assert_eq!(dispatcher.registry().len(), 1);
        assert_no_calls(&mut rx).await;
    }

    #[tokio::test]
    async fn test_connect_starts_receive() {
        let (mut dispatcher, _rx) = dispatcher();
        let (started_tx, started_rx) = oneshot::channel();
        let (tx, _out) = mpsc::channel(1);
        let receive = async move {
            let _ = started_tx.send(());
        }
        .boxed();

        dispatcher.handle_event(Event::Connect(Connection::new(
            Client::new(ClientId::from("A"), tx),
            receive,
        )));

        assert!(timeout(Duration::from_secs(1), started_rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_removes_and_short_circuits() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "CLOSE:A");

        assert!(!dispatcher.registry().contains(&ClientId::from("A")));
        assert_eq!(next_call(&mut rx).await, Call::Close(ClientId::from("A")));
        assert_no_calls(&mut rx).await;
    }

    #[tokio::test]
    async fn test_close_stops_receive_loop() {
        let (mut dispatcher, mut rx) = dispatcher();
        let (tx, _out) = mpsc::channel(1);
        let client = Client::new(ClientId::from("A"), tx);
        let handle = client.clone();

        dispatcher.handle_event(Event::Connect(Connection::new(client, async {}.boxed())));
        assert_eq!(next_call(&mut rx).await, Call::Connect(ClientId::from("A")));
        assert!(!handle.is_closing());

        message(&mut dispatcher, "CLOSE:A");

        assert!(handle.is_closing());
        assert_eq!(next_call(&mut rx).await, Call::Close(ClientId::from("A")));
    }

    #[tokio::test]
    async fn test_reconnect_same_id_closes_previous() {
        let (mut dispatcher, mut rx) = dispatcher();
        let (tx, _out) = mpsc::channel(1);
        let first = Client::new(ClientId::from("A"), tx);
        let handle = first.clone();

        dispatcher.handle_event(Event::Connect(Connection::new(first, async {}.boxed())));
        assert_eq!(next_call(&mut rx).await, Call::Connect(ClientId::from("A")));

        connect(&mut dispatcher, &mut rx, "A").await;

        assert!(handle.is_closing());
        assert_eq!(dispatcher.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_close_unknown_falls_through() {
        let (mut dispatcher, mut rx) = dispatcher();

        message(&mut dispatcher, "CLOSE:Z");

        assert_eq!(next_call(&mut rx).await, Call::Message(None, "Z".to_string()));
        assert_no_calls(&mut rx).await;
    }

    #[tokio::test]
    async fn test_routed_delivery() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "A:hello");

        assert_eq!(
            next_call(&mut rx).await,
            Call::Message(Some(ClientId::from("A")), "hello".to_string())
        );
        assert_no_calls(&mut rx).await;
    }

    #[tokio::test]
    async fn test_unknown_target_is_absent() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "B:hi");

        assert_eq!(next_call(&mut rx).await, Call::Message(None, "hi".to_string()));
        assert!(dispatcher.registry().contains(&ClientId::from("A")));
    }

    #[tokio::test]
    async fn test_content_preserves_colons() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "A:10:20:30");

        assert_eq!(
            next_call(&mut rx).await,
            Call::Message(Some(ClientId::from("A")), "10:20:30".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "nodata");
        message(&mut dispatcher, "");

        assert_no_calls(&mut rx).await;
        assert_eq!(dispatcher.registry().len(), 1);

        // The loop keeps working afterwards
        message(&mut dispatcher, "A:still here");
        assert_eq!(
            next_call(&mut rx).await,
            Call::Message(Some(ClientId::from("A")), "still here".to_string())
        );
    }

    #[tokio::test]
    async fn test_double_close_falls_through() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "A").await;

        message(&mut dispatcher, "CLOSE:A");
        assert_eq!(next_call(&mut rx).await, Call::Close(ClientId::from("A")));

        message(&mut dispatcher, "CLOSE:A");
        assert_eq!(next_call(&mut rx).await, Call::Message(None, "A".to_string()));
        assert_no_calls(&mut rx).await;
    }

    #[tokio::test]
    async fn test_close_unknown_routes_to_client_named_close() {
        let (mut dispatcher, mut rx) = dispatcher();
        connect(&mut dispatcher, &mut rx, "CLOSE").await;

        message(&mut dispatcher, "CLOSE:Z");

        assert_eq!(
            next_call(&mut rx).await,
            Call::Message(Some(ClientId::from("CLOSE")), "Z".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_until_consumes_both_streams() {
        let (mut dispatcher, mut rx) = dispatcher();
        let sinks = dispatcher.sinks();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let run = tokio::spawn(async move {
            dispatcher
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            dispatcher
        });

        sinks.clients.send(connection("A")).await.unwrap();
        assert_eq!(next_call(&mut rx).await, Call::Connect(ClientId::from("A")));

        sinks.messages.send("A:hello".to_string()).await.unwrap();
        assert_eq!(
            next_call(&mut rx).await,
            Call::Message(Some(ClientId::from("A")), "hello".to_string())
        );

        sinks.messages.send("CLOSE:A".to_string()).await.unwrap();
        assert_eq!(next_call(&mut rx).await, Call::Close(ClientId::from("A")));

        let _ = shutdown_tx.send(());
        let dispatcher = timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
        assert!(dispatcher.registry().is_empty());
    }
}
