use crate::bus::Topic;
use std::time::Duration;

/// Payload published by the connection manager
///
/// Each variant is published on exactly one well-known [`Topic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A transport session opened
    Connected { address: String },
    /// An established session ended (lost, or closed by `disconnect`)
    Disconnected { reason: String },
    /// First chunk of a new logical message
    MessageComplete { text: String },
    /// Further chunk of the logical message started by the last `MessageComplete`
    MessagePartial { text: String },
    /// The next attempt opens after `delay`; `attempt` counts from 1
    ReconnectScheduled { delay: Duration, attempt: u32 },
    /// No more automatic retries until an explicit `connect`
    ReconnectExhausted { attempts: u32 },
    /// Transport-level error; the close that follows drives the state machine
    TransportError { reason: String },
}

impl ChatEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ChatEvent::Connected { .. } => Topic::CONNECTED,
            ChatEvent::Disconnected { .. } => Topic::DISCONNECTED,
            ChatEvent::MessageComplete { .. } => Topic::MESSAGE_COMPLETE,
            ChatEvent::MessagePartial { .. } => Topic::MESSAGE_PARTIAL,
            ChatEvent::ReconnectScheduled { .. } => Topic::RECONNECT_SCHEDULED,
            ChatEvent::ReconnectExhausted { .. } => Topic::RECONNECT_EXHAUSTED,
            ChatEvent::TransportError { .. } => Topic::TRANSPORT_ERROR,
        }
    }

    /// Message text, for the two message topics
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatEvent::MessageComplete { text } | ChatEvent::MessagePartial { text } => Some(text),
            _ => None,
        }
    }
}
