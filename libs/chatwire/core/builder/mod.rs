pub mod states;

use crate::bus::EventBus;
use crate::client::ChatClient;
use crate::config::ConnectionConfig;
use crate::event::ChatEvent;
use crate::traits::*;
use crate::ws::WsTransport;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for ChatClient
///
/// An address (directly or through a whole [`ConnectionConfig`]) must be
/// given before the client can be built. Everything else has defaults:
/// WebSocket transport, exponential backoff from the config, fresh bus.
pub struct ChatClientBuilder<A: AddressState> {
    _state: TypeState<A>,
    config: ConnectionConfig,
    transport: Option<Arc<dyn Transport>>,
    policy: Option<Box<dyn BackoffPolicy>>,
    bus: Option<EventBus<ChatEvent>>,
}

impl ChatClientBuilder<NoAddress> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            config: ConnectionConfig::default(),
            transport: None,
            policy: None,
            bus: None,
        }
    }

    pub fn address(self, address: impl Into<String>) -> ChatClientBuilder<HasAddress> {
        let Self {
            mut config,
            transport,
            policy,
            bus,
            ..
        } = self;
        config.address = address.into();
        ChatClientBuilder {
            _state: TypeState::new(),
            config,
            transport,
            policy,
            bus,
        }
    }

    /// Take every setting, address included, from a loaded config
    ///
    /// Replaces any backoff values set on this builder so far.
    pub fn config(self, config: ConnectionConfig) -> ChatClientBuilder<HasAddress> {
        self.with_config(config)
    }

    fn with_config(self, config: ConnectionConfig) -> ChatClientBuilder<HasAddress> {
        ChatClientBuilder {
            _state: TypeState::new(),
            config,
            transport: self.transport,
            policy: self.policy,
            bus: self.bus,
        }
    }
}

impl Default for ChatClientBuilder<NoAddress> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<A: AddressState> ChatClientBuilder<A> {
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Retries allowed after a loss; `0` disables automatic reconnection
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn sentinel(mut self, sentinel: char) -> Self {
        self.config.sentinel = sentinel;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replace the WebSocket transport (tests use an in-memory one)
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replace the backoff derived from the config values
    pub fn policy(mut self, policy: impl BackoffPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Publish onto an existing bus instead of a fresh one
    pub fn bus(mut self, bus: EventBus<ChatEvent>) -> Self {
        self.bus = Some(bus);
        self
    }
}

// Build method - only available once an address is set
impl ChatClientBuilder<HasAddress> {
    /// Validate the configuration and spawn the connection task
    ///
    /// Must be called from within a Tokio runtime. The client starts
    /// disconnected; call `connect` to open the first session.
    pub fn build(self) -> Result<ChatClient> {
        self.config.validate()?;

        let policy = self
            .policy
            .unwrap_or_else(|| Box::new(self.config.backoff()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport));
        let bus = self.bus.unwrap_or_default();

        ChatClient::spawn(self.config, transport, policy, bus)
    }
}
