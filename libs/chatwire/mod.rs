//! # Chatwire
//!
//! Resilient chat transport: a reconnecting text-frame connection that
//! reassembles sentinel-terminated messages and reports everything it
//! does on a topic bus.
//!
//! ## Features
//!
//! - **Event bus**: Publishers and listeners never reference each other
//! - **Bounded backoff**: Exponential delays with a cap and a retry budget
//! - **Frame reassembly**: Multi-frame messages split by a NUL terminator frame
//! - **Sans-IO state machine**: Every transition unit-testable without sockets or clocks
//! - **Type-state builder**: An address must be set before a client can be built

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, bus, client, config, connection_state, event, machine, reassembler, ws,
    builder::{states, ChatClientBuilder},
    bus::{EventBus, Listener, ListenerError, SubscriptionHandle, Topic},
    client::{ChatClient, Metrics},
    config::{ConfigError, ConnectionConfig, ADDRESS_ENV_VAR},
    connection_state::{AtomicConnectionState, AtomicMetrics, AtomicRetryStatus, ConnectionState},
    event::ChatEvent,
    machine::{ConnectionMachine, Effect, Input, SessionId, TimerId},
    reassembler::{Chunk, ChunkKind, FrameReassembler, DEFAULT_SENTINEL},
    ws::{WsSession, WsTransport},
};

/// Create a new chat client builder
pub fn builder() -> ChatClientBuilder<states::NoAddress> {
    ChatClientBuilder::new()
}
