use super::error::Result;
use async_trait::async_trait;

/// Something read from a live transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame, delivered in arrival order
    Frame(String),
    /// The peer closed the session
    Closed(String),
}

/// Trait for opening transport sessions
///
/// The connection manager depends only on this capability, never on a
/// concrete socket. Implement it to plug in another transport or a
/// scripted one for tests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a session to `address`
    ///
    /// # Returns
    /// * `Ok(session)` - The session is open and ready for frames
    /// * `Err(ChatWireError)` - The open attempt failed
    async fn open(&self, address: &str) -> Result<Box<dyn TransportSession>>;
}

/// A single open transport handle
///
/// `recv` must be cancel-safe: the driver polls it inside `select!` and may
/// drop the future to service a command.
#[async_trait]
pub trait TransportSession: Send {
    /// Write one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next inbound frame or close
    ///
    /// An `Err` means the session is broken; no further frames follow.
    async fn recv(&mut self) -> Result<Inbound>;

    /// Close the session; closing an already closed session is not an error
    async fn close(&mut self) -> Result<()>;
}
