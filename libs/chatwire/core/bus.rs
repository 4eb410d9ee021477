//! Topic-based publish/subscribe bus
//!
//! The bus decouples the connection manager from whatever consumes its
//! events. Nothing on either side holds a reference to the other.
//!
//! # Re-entrancy
//!
//! ```text
//! publish(topic) ──> snapshot listeners (read lock) ──> release lock
//!                                                        │
//!                         ┌──────────────────────────────┘
//!                         ▼
//!               listener 1, listener 2, ...   (may subscribe / unsubscribe /
//!                                              publish without deadlocking)
//! ```
//!
//! A listener removed during a publish still sees the payload that was
//! already being delivered; it is not invoked for later publishes.
//!
//! # Failure isolation
//!
//! Every listener runs even if an earlier one returned an error or
//! panicked. The failures are collected and handed back to the publisher
//! as a single [`ChatWireError::Listener`].

use crate::traits::{ChatWireError, Result};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error a listener may return
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Shared listener callback
pub type Listener<P> = Arc<dyn Fn(&P) -> std::result::Result<(), ListenerError> + Send + Sync>;

/// Named event category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// A session opened
    pub const CONNECTED: Topic = Topic(Cow::Borrowed("connected"));
    /// An established session was lost or closed locally
    pub const DISCONNECTED: Topic = Topic(Cow::Borrowed("disconnected"));
    /// First chunk of a new logical message
    pub const MESSAGE_COMPLETE: Topic = Topic(Cow::Borrowed("message-complete"));
    /// Continuation chunk of the current logical message
    pub const MESSAGE_PARTIAL: Topic = Topic(Cow::Borrowed("message-partial"));
    /// A retry was scheduled
    pub const RECONNECT_SCHEDULED: Topic = Topic(Cow::Borrowed("reconnect-scheduled"));
    /// The retry budget ran out
    pub const RECONNECT_EXHAUSTED: Topic = Topic(Cow::Borrowed("reconnect-exhausted"));
    /// The transport reported an error
    pub const TRANSPORT_ERROR: Topic = Topic(Cow::Borrowed("transport-error"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Topic(name.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Topic {
    fn from(name: &'static str) -> Self {
        Topic(Cow::Borrowed(name))
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Topic(Cow::Owned(name))
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: Topic,
    id: u64,
}

struct Registry<P> {
    topics: RwLock<HashMap<Topic, Vec<(u64, Listener<P>)>>>,
    next_id: AtomicU64,
}

/// Publish/subscribe registry keyed by [`Topic`]
///
/// Cloning is cheap and yields a handle to the same registry.
pub struct EventBus<P> {
    registry: Arc<Registry<P>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.registry.topics.read();
        f.debug_struct("EventBus")
            .field("topics", &topics.len())
            .finish()
    }
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `listener` under `topic`
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> SubscriptionHandle
    where
        F: Fn(&P) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .topics
            .write()
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        SubscriptionHandle { topic, id }
    }

    /// Remove a listener
    ///
    /// Returns `false` if the handle was not (or no longer) registered.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut topics = self.registry.topics.write();
        let Some(listeners) = topics.get_mut(&handle.topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            topics.remove(&handle.topic);
        }
        removed
    }

    /// Invoke every listener currently registered for `topic`
    ///
    /// # Returns
    /// * `Ok(n)` - `n` listeners ran successfully (0 for an unknown topic)
    /// * `Err(ChatWireError::Listener)` - at least one listener failed; all
    ///   listeners were still invoked
    pub fn publish(&self, topic: &Topic, payload: &P) -> Result<usize> {
        let snapshot: Vec<Listener<P>> = match self.registry.topics.read().get(topic) {
            Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return Ok(0),
        };

        let mut failures = Vec::new();
        for listener in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(panic) => failures.push(panic_message(panic.as_ref())),
            }
        }

        if failures.is_empty() {
            Ok(snapshot.len())
        } else {
            Err(ChatWireError::Listener {
                topic: topic.to_string(),
                failed: failures.len(),
                reason: failures.join("; "),
            })
        }
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.registry
            .topics
            .read()
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl<P> EventBus<P>
where
    P: Clone + Send + 'static,
{
    /// Subscribe a forwarding listener and return the receiving end
    ///
    /// Useful for pull-style consumers. Once the receiver is dropped the
    /// listener fails on every publish until it is unsubscribed.
    pub fn channel(
        &self,
        topic: impl Into<Topic>,
    ) -> (SubscriptionHandle, crossbeam_channel::Receiver<P>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = self.subscribe(topic, move |payload: &P| {
            tx.send(payload.clone())
                .map_err(|_| ListenerError::from("subscription receiver dropped"))
        });
        (handle, rx)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}
