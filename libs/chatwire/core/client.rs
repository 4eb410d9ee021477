use crate::builder::{states::NoAddress, ChatClientBuilder};
use crate::bus::{EventBus, ListenerError, SubscriptionHandle, Topic};
use crate::config::ConnectionConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, AtomicRetryStatus, ConnectionState};
use crate::event::ChatEvent;
use crate::machine::{ConnectionMachine, Effect, Input, SessionId, TimerId};
use crate::traits::*;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Sleep;
use tracing::{debug, info, warn};

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Connect (or reconnect) to an address
    Connect(String),
    /// Send a text frame if connected
    Send(String),
    /// Drop the connection without retrying
    Disconnect,
    /// Stop the connection task
    Shutdown,
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub retry_attempts: u32,
    pub connection_state: ConnectionState,
}

/// Chat client façade
///
/// The only entry point for collaborators: connect, send, query the
/// retry budget, and subscribe to [`ChatEvent`]s on the bus. All
/// transitions happen on a dedicated Tokio task; the methods here only
/// enqueue commands or read atomic mirrors, so none of them block.
///
/// # Example
///
/// ```rust,ignore
/// let client = ChatClient::builder()
///     .address("ws://127.0.0.1:8080/ws")
///     .max_attempts(30)
///     .build()?;
///
/// client.subscribe(Topic::MESSAGE_COMPLETE, |event| {
///     println!("{}", event.text().unwrap_or_default());
///     Ok(())
/// });
///
/// client.connect_configured()?;
/// client.send("alice hello")?;
/// ```
pub struct ChatClient {
    config: Arc<ConnectionConfig>,
    bus: EventBus<ChatEvent>,
    state: Arc<AtomicConnectionState>,
    retry: Arc<AtomicRetryStatus>,
    metrics: Arc<AtomicMetrics>,
    command_tx: UnboundedSender<ClientCommand>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ChatClient {
    /// Start building a client
    pub fn builder() -> ChatClientBuilder<NoAddress> {
        ChatClientBuilder::new()
    }

    /// Build a client over WebSocket from a loaded configuration
    pub fn from_config(config: ConnectionConfig) -> Result<Self> {
        ChatClientBuilder::new().config(config).build()
    }

    /// Spawn the connection task
    ///
    /// Called by the builder's `build()` once the configuration is valid.
    pub(crate) fn spawn(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        policy: Box<dyn BackoffPolicy>,
        bus: EventBus<ChatEvent>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ChatWireError::Configuration(format!("ChatClient must be built inside a Tokio runtime: {e}"))
        })?;

        let machine = ConnectionMachine::new(policy, config.sentinel);
        let state = Arc::new(AtomicConnectionState::new(machine.state()));
        let retry = Arc::new(AtomicRetryStatus::new(machine.can_reconnect()));
        let metrics = Arc::new(AtomicMetrics::new());
        let (command_tx, command_rx) = unbounded_channel();

        let driver = Driver {
            machine,
            transport,
            bus: bus.clone(),
            open_timeout: config.open_timeout(),
            state: Arc::clone(&state),
            retry: Arc::clone(&retry),
            metrics: Arc::clone(&metrics),
            opening: None,
            live: None,
            pending_retry: None,
        };
        let task_handle = runtime.spawn(driver.run(command_rx));

        Ok(Self {
            config: Arc::new(config),
            bus,
            state,
            retry,
            metrics,
            command_tx,
            task_handle: Some(task_handle),
        })
    }

    /// Connect to `address`, tearing down any existing session first
    ///
    /// Resets the retry budget. Safe to call in any state.
    pub fn connect(&self, address: impl Into<String>) -> Result<()> {
        self.command(ClientCommand::Connect(address.into()))
    }

    /// Connect to the address from the configuration
    pub fn connect_configured(&self) -> Result<()> {
        self.connect(self.config.address.clone())
    }

    /// Send one text frame
    ///
    /// Only delivered while connected; in any other state the text is
    /// dropped without error. Nothing is queued across reconnects.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.command(ClientCommand::Send(text.into()))
    }

    /// Close the connection and stop retrying until the next `connect`
    pub fn disconnect(&self) -> Result<()> {
        self.command(ClientCommand::Disconnect)
    }

    /// Whether the retry budget still allows an automatic reconnect
    #[inline]
    pub fn can_reconnect(&self) -> bool {
        self.retry.can_retry()
    }

    /// Get current connection state
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Subscribe to a topic on this client's bus
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> SubscriptionHandle
    where
        F: Fn(&ChatEvent) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.bus.subscribe(topic, listener)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// The bus this client publishes on
    pub fn bus(&self) -> &EventBus<ChatEvent> {
        &self.bus
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_sent: self.metrics.frames_sent(),
            frames_received: self.metrics.frames_received(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            retry_attempts: self.retry.attempts(),
            connection_state: self.state.get(),
        }
    }

    /// Shutdown the client
    ///
    /// Closes the live session, cancels any pending retry and waits for
    /// the connection task to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down chat client");
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| ChatWireError::Other(format!("connection task failed: {e}")))?;
        }
        Ok(())
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ChatWireError::ChannelSend(e.to_string()))
    }
}

/// Open attempt in flight
struct PendingOpen {
    session: SessionId,
    future: BoxFuture<'static, Result<Box<dyn TransportSession>>>,
}

/// The one live transport handle
struct LiveSession {
    session: SessionId,
    handle: Box<dyn TransportSession>,
}

/// The one scheduled retry
struct PendingRetry {
    timer: TimerId,
    sleep: Pin<Box<Sleep>>,
}

/// What woke the connection task
enum Wake {
    Command(Option<ClientCommand>),
    Opened(SessionId, Result<Box<dyn TransportSession>>),
    Inbound(SessionId, Result<Inbound>),
    RetryDue(TimerId),
}

/// Connection task: turns I/O wake-ups into machine inputs and carries
/// out the effects the machine returns
struct Driver {
    machine: ConnectionMachine,
    transport: Arc<dyn Transport>,
    bus: EventBus<ChatEvent>,
    open_timeout: Duration,
    state: Arc<AtomicConnectionState>,
    retry: Arc<AtomicRetryStatus>,
    metrics: Arc<AtomicMetrics>,
    opening: Option<PendingOpen>,
    live: Option<LiveSession>,
    pending_retry: Option<PendingRetry>,
}

impl Driver {
    /// Main client task loop
    async fn run(mut self, mut commands: UnboundedReceiver<ClientCommand>) {
        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                (session, result) = wait_open(&mut self.opening) => Wake::Opened(session, result),
                (session, inbound) = wait_inbound(&mut self.live) => Wake::Inbound(session, inbound),
                timer = wait_retry(&mut self.pending_retry) => Wake::RetryDue(timer),
            };

            let inputs = match wake {
                Wake::Command(Some(ClientCommand::Connect(address))) => vec![Input::Connect { address }],
                Wake::Command(Some(ClientCommand::Send(text))) => vec![Input::Send { text }],
                Wake::Command(Some(ClientCommand::Disconnect)) => vec![Input::Disconnect],
                Wake::Command(Some(ClientCommand::Shutdown)) | Wake::Command(None) => {
                    debug!("Shutdown requested, closing connection");
                    self.dispatch(vec![Input::Disconnect]).await;
                    break;
                }
                Wake::Opened(session, Ok(handle)) => {
                    self.live = Some(LiveSession { session, handle });
                    vec![Input::TransportOpened { session }]
                }
                Wake::Opened(session, Err(e)) => failure_inputs(session, e.to_string()),
                Wake::Inbound(session, Ok(Inbound::Frame(frame))) => {
                    self.metrics.increment_received();
                    vec![Input::TransportFrame { session, frame }]
                }
                Wake::Inbound(session, Ok(Inbound::Closed(reason))) => {
                    self.live = None;
                    vec![Input::TransportClosed { session, reason }]
                }
                Wake::Inbound(session, Err(e)) => {
                    self.live = None;
                    failure_inputs(session, e.to_string())
                }
                Wake::RetryDue(timer) => {
                    self.metrics.increment_reconnects();
                    vec![Input::RetryElapsed { timer }]
                }
            };

            self.dispatch(inputs).await;
        }

        info!("Chat client task exiting");
    }

    async fn dispatch(&mut self, inputs: Vec<Input>) {
        let mut queue: VecDeque<Input> = inputs.into();
        while let Some(input) = queue.pop_front() {
            let effects = self.machine.handle(input);
            self.mirror();
            for effect in effects {
                self.apply(effect, &mut queue).await;
            }
        }
    }

    async fn apply(&mut self, effect: Effect, queue: &mut VecDeque<Input>) {
        match effect {
            Effect::OpenTransport { session, address } => {
                debug!("Opening session {:?} to {}", session, address);
                let transport = Arc::clone(&self.transport);
                let timeout = self.open_timeout;
                let future: BoxFuture<'static, Result<Box<dyn TransportSession>>> = Box::pin(async move {
                    match tokio::time::timeout(timeout, transport.open(&address)).await {
                        Ok(result) => result,
                        Err(_) => Err(ChatWireError::Timeout(format!(
                            "opening {} took longer than {:?}",
                            address, timeout
                        ))),
                    }
                });
                self.opening = Some(PendingOpen { session, future });
            }
            Effect::CloseTransport { session } => {
                if self.opening.as_ref().is_some_and(|p| p.session == session) {
                    debug!("Cancelling in-flight open of session {:?}", session);
                    self.opening = None;
                }
                if self.live.as_ref().is_some_and(|l| l.session == session) {
                    if let Some(mut live) = self.live.take() {
                        if let Err(e) = live.handle.close().await {
                            debug!("Error closing session {:?}: {}", session, e);
                        }
                    }
                }
            }
            Effect::WriteFrame { session, text } => {
                let Some(live) = self.live.as_mut().filter(|l| l.session == session) else {
                    debug!("No live session {:?} to write to", session);
                    return;
                };
                match live.handle.send(text).await {
                    Ok(()) => self.metrics.increment_sent(),
                    Err(e) => {
                        self.live = None;
                        queue.extend(failure_inputs(session, e.to_string()));
                    }
                }
            }
            Effect::ScheduleRetry { timer, delay } => {
                self.pending_retry = Some(PendingRetry {
                    timer,
                    sleep: Box::pin(tokio::time::sleep(delay)),
                });
            }
            Effect::CancelRetry { timer } => {
                if self.pending_retry.as_ref().is_some_and(|r| r.timer == timer) {
                    self.pending_retry = None;
                }
            }
            Effect::Publish(event) => self.publish(&event),
        }
    }

    /// Publish with listener failures contained
    fn publish(&self, event: &ChatEvent) {
        if matches!(event, ChatEvent::MessageComplete { .. }) {
            self.metrics.increment_messages();
        }
        if let Err(e) = self.bus.publish(&event.topic(), event) {
            warn!("Bus listener failed: {}", e);
        }
    }

    fn mirror(&self) {
        self.state.set(self.machine.state());
        self.retry
            .update(self.machine.counter().attempts, self.machine.can_reconnect());
    }
}

/// A broken transport reports its error, then its close
fn failure_inputs(session: SessionId, reason: String) -> Vec<Input> {
    vec![
        Input::TransportError {
            session,
            reason: reason.clone(),
        },
        Input::TransportClosed { session, reason },
    ]
}

async fn wait_open(slot: &mut Option<PendingOpen>) -> (SessionId, Result<Box<dyn TransportSession>>) {
    let Some(pending) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let result = pending.future.as_mut().await;
    let session = pending.session;
    *slot = None;
    (session, result)
}

async fn wait_inbound(slot: &mut Option<LiveSession>) -> (SessionId, Result<Inbound>) {
    let Some(live) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let inbound = live.handle.recv().await;
    (live.session, inbound)
}

async fn wait_retry(slot: &mut Option<PendingRetry>) -> TimerId {
    let Some(retry) = slot.as_mut() else {
        return std::future::pending().await;
    };
    retry.sleep.as_mut().await;
    let timer = retry.timer;
    *slot = None;
    timer
}
