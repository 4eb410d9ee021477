//! # Chatwire Traits
//!
//! Seams of the chatwire transport layer:
//!
//! - **BackoffPolicy**: Compute the delay sequence between reconnects
//! - **Transport / TransportSession**: Open and drive a frame transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatwire::traits::*;
//!
//! struct LoopbackTransport;
//!
//! #[async_trait]
//! impl Transport for LoopbackTransport {
//!     async fn open(&self, address: &str) -> Result<Box<dyn TransportSession>> {
//!         // Your connection logic here
//!     }
//! }
//! ```

pub mod error;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use async_trait::async_trait;
pub use error::{ChatWireError, Result};
pub use reconnect::{BackoffPolicy, ExponentialBackoff, FixedDelay, NeverReconnect, RetryCounter};
pub use transport::{Inbound, Transport, TransportSession};
