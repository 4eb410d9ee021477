//! Chat connection core
//!
//! - **bus**: topic-based publish/subscribe with isolated listeners
//! - **reassembler**: sentinel-terminated frame decoding
//! - **machine**: pure reconnecting state machine (inputs in, effects out)
//! - **client**: async driver plus the `ChatClient` façade
//! - **ws**: tokio-tungstenite transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatwire::{ChatClient, Topic};
//!
//! #[tokio::main]
//! async fn main() -> chatwire::Result<()> {
//!     let client = ChatClient::builder()
//!         .address("ws://127.0.0.1:8080/ws")
//!         .build()?;
//!
//!     client.subscribe(Topic::MESSAGE_COMPLETE, |event| {
//!         println!("{}", event.text().unwrap_or_default());
//!         Ok(())
//!     });
//!
//!     client.connect_configured()?;
//!     client.send("alice hello")?;
//!     client.shutdown().await
//! }
//! ```

pub mod builder;
pub mod bus;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod event;
pub mod machine;
pub mod reassembler;
pub mod ws;

// Re-export main types
pub use builder::{states, ChatClientBuilder};
pub use bus::{EventBus, Listener, ListenerError, SubscriptionHandle, Topic};
pub use client::{ChatClient, Metrics};
pub use config::{ConfigError, ConnectionConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, AtomicRetryStatus, ConnectionState};
pub use event::ChatEvent;
pub use machine::{ConnectionMachine, Effect, Input, SessionId, TimerId};
pub use reassembler::{Chunk, ChunkKind, FrameReassembler, DEFAULT_SENTINEL};
pub use ws::{WsSession, WsTransport};

// Re-export traits for convenience
pub use crate::traits::*;
