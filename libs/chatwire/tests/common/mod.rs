//! Common test utilities for chatwire integration tests
//!
//! Provides a scripted in-memory transport for deterministic
//! (paused-clock) tests and a mock WebSocket server for real-socket ones.

#![allow(dead_code)]

use chatwire::traits::*;
use chatwire::{ChatClient, ChatEvent, Topic};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// What the next `open` call does
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Accept,
    Refuse(String),
    /// Never completes; exercises the open timeout
    Hang,
}

/// Server side of one scripted session
pub struct ServerEnd {
    to_client: UnboundedSender<Inbound>,
    from_client: UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn push(&self, frame: &str) {
        let _ = self.to_client.send(Inbound::Frame(frame.to_string()));
    }

    pub fn close(&self, reason: &str) {
        let _ = self.to_client.send(Inbound::Closed(reason.to_string()));
    }

    /// Frames the client has written so far
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(text);
        }
        sent
    }
}

struct ScriptedSession {
    inbound: UnboundedReceiver<Inbound>,
    outbound: UnboundedSender<String>,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| ChatWireError::ConnectionClosed("server end dropped".into()))
    }

    async fn recv(&mut self) -> Result<Inbound> {
        match self.inbound.recv().await {
            Some(inbound) => Ok(inbound),
            None => Ok(Inbound::Closed("server end dropped".into())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory transport driven by a script of open outcomes
///
/// An empty script refuses every open.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<OpenOutcome>>>,
    opens: Arc<Mutex<Vec<(String, Instant)>>>,
    servers: UnboundedSender<ServerEnd>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, address: &str) -> Result<Box<dyn TransportSession>> {
        self.opens.lock().push((address.to_string(), Instant::now()));
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| OpenOutcome::Refuse("connection refused".into()));

        match outcome {
            OpenOutcome::Accept => {
                let (to_client, inbound) = unbounded_channel();
                let (outbound, from_client) = unbounded_channel();
                let _ = self.servers.send(ServerEnd {
                    to_client,
                    from_client,
                });
                Ok(Box::new(ScriptedSession { inbound, outbound }))
            }
            OpenOutcome::Refuse(reason) => Err(ChatWireError::WebSocket(reason)),
            OpenOutcome::Hang => std::future::pending().await,
        }
    }
}

/// Test-side view of a [`ScriptedTransport`]
pub struct Harness {
    script: Arc<Mutex<VecDeque<OpenOutcome>>>,
    opens: Arc<Mutex<Vec<(String, Instant)>>>,
    servers: UnboundedReceiver<ServerEnd>,
}

impl Harness {
    pub fn script(&self, outcomes: impl IntoIterator<Item = OpenOutcome>) {
        self.script.lock().extend(outcomes);
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    /// Open times relative to `start`, in milliseconds
    pub fn open_offsets_ms(&self, start: Instant) -> Vec<u128> {
        self.opens
            .lock()
            .iter()
            .map(|(_, at)| at.duration_since(start).as_millis())
            .collect()
    }

    pub fn opened_addresses(&self) -> Vec<String> {
        self.opens.lock().iter().map(|(a, _)| a.clone()).collect()
    }

    /// Wait for the next accepted session
    pub async fn next_server(&mut self) -> ServerEnd {
        tokio::time::timeout(Duration::from_secs(300), self.servers.recv())
            .await
            .expect("timed out waiting for a session")
            .expect("transport dropped")
    }
}

pub fn scripted_transport() -> (ScriptedTransport, Harness) {
    let script = Arc::new(Mutex::new(VecDeque::new()));
    let opens = Arc::new(Mutex::new(Vec::new()));
    let (servers_tx, servers_rx) = unbounded_channel();
    (
        ScriptedTransport {
            script: Arc::clone(&script),
            opens: Arc::clone(&opens),
            servers: servers_tx,
        },
        Harness {
            script,
            opens,
            servers: servers_rx,
        },
    )
}

/// Every event the client publishes, in order
pub fn record_events(client: &ChatClient) -> Arc<Mutex<Vec<ChatEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let topics = [
        Topic::CONNECTED,
        Topic::DISCONNECTED,
        Topic::MESSAGE_COMPLETE,
        Topic::MESSAGE_PARTIAL,
        Topic::RECONNECT_SCHEDULED,
        Topic::RECONNECT_EXHAUSTED,
        Topic::TRANSPORT_ERROR,
    ];
    for topic in topics {
        let events = Arc::clone(&events);
        client.subscribe(topic, move |event| {
            events.lock().push(event.clone());
            Ok(())
        });
    }
    events
}

/// Poll `condition` until it holds; panics after five virtual minutes
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(300);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Count events matching `predicate`
pub fn count(events: &Mutex<Vec<ChatEvent>>, predicate: impl Fn(&ChatEvent) -> bool) -> usize {
    events.lock().iter().filter(|e| predicate(e)).count()
}

/// Mock chat server over real WebSockets
///
/// Greets every client with the two-frame message `"Hel" "lo"`, then
/// echoes each text frame back as a one-frame message.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let mut ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        for frame in ["Hel", "lo", "\0"] {
            if ws_stream.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if ws_stream.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                            if ws_stream.send(Message::Text("\0".into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown.notified() => {
                    let _ = ws_stream.close(None).await;
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
