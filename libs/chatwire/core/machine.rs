//! Connection state machine
//!
//! The machine never touches a socket or a timer. The driver feeds it
//! discrete [`Input`]s and carries out the [`Effect`]s it returns:
//!
//! ```text
//!                 connect
//!  Disconnected ───────────> Connecting ──open──> Connected ──frame──┐
//!       ▲                      │    ▲                 │   ▲          │
//!       │ budget exhausted     │    │ delay elapsed   │   └──────────┘
//!       │                      ▼    │                 │
//!       └──────────────── Reconnecting <──── close ───┘
//! ```
//!
//! Session and timer identifiers let the machine ignore events that
//! belong to a transport or timer it already abandoned, so at most one
//! of each is ever live.

use crate::connection_state::ConnectionState;
use crate::event::ChatEvent;
use crate::reassembler::{ChunkKind, FrameReassembler};
use crate::traits::{BackoffPolicy, RetryCounter};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifies one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

/// Identifies one scheduled retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Events the driver feeds into the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Caller asked to connect (or reconnect) to `address`
    Connect { address: String },
    /// Caller asked to drop the connection without retrying
    Disconnect,
    /// Caller wants to send an outbound frame
    Send { text: String },
    /// The transport finished opening
    TransportOpened { session: SessionId },
    /// A text frame arrived
    TransportFrame { session: SessionId, frame: String },
    /// The transport reported an error
    TransportError { session: SessionId, reason: String },
    /// The transport is gone
    TransportClosed { session: SessionId, reason: String },
    /// A scheduled retry delay elapsed
    RetryElapsed { timer: TimerId },
}

/// Side effects the driver must perform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenTransport { session: SessionId, address: String },
    CloseTransport { session: SessionId },
    WriteFrame { session: SessionId, text: String },
    ScheduleRetry { timer: TimerId, delay: Duration },
    CancelRetry { timer: TimerId },
    Publish(ChatEvent),
}

/// Reconnecting connection state machine
pub struct ConnectionMachine {
    policy: Box<dyn BackoffPolicy>,
    state: ConnectionState,
    counter: RetryCounter,
    reassembler: FrameReassembler,
    address: Option<String>,
    session: Option<SessionId>,
    timer: Option<TimerId>,
    next_id: u64,
    exhausted: bool,
}

impl ConnectionMachine {
    pub fn new(policy: Box<dyn BackoffPolicy>, sentinel: char) -> Self {
        let counter = policy.reset();
        Self {
            policy,
            state: ConnectionState::Disconnected,
            counter,
            reassembler: FrameReassembler::with_sentinel(sentinel),
            address: None,
            session: None,
            timer: None,
            next_id: 0,
            exhausted: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn counter(&self) -> RetryCounter {
        self.counter
    }

    /// Whether another automatic retry may still be scheduled
    pub fn can_reconnect(&self) -> bool {
        self.policy.can_retry(&self.counter)
    }

    /// Address of the last `connect`, reused by retries
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn live_session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Apply one input and return the effects to perform
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            Input::Connect { address } => self.on_connect(address, &mut effects),
            Input::Disconnect => self.on_disconnect(&mut effects),
            Input::Send { text } => self.on_send(text, &mut effects),
            Input::TransportOpened { session } => self.on_opened(session, &mut effects),
            Input::TransportFrame { session, frame } => self.on_frame(session, &frame, &mut effects),
            Input::TransportError { session, reason } => self.on_error(session, reason, &mut effects),
            Input::TransportClosed { session, reason } => self.on_closed(session, reason, &mut effects),
            Input::RetryElapsed { timer } => self.on_retry_elapsed(timer, &mut effects),
        }
        effects
    }

    fn on_connect(&mut self, address: String, effects: &mut Vec<Effect>) {
        info!("Connecting to {}", address);
        self.teardown(effects);
        self.counter = self.policy.reset();
        self.exhausted = false;
        self.address = Some(address.clone());
        self.start_attempt(address, effects);
    }

    fn on_disconnect(&mut self, effects: &mut Vec<Effect>) {
        let was_connected = self.state == ConnectionState::Connected;
        self.teardown(effects);
        self.state = ConnectionState::Disconnected;
        if was_connected {
            info!("Disconnected by client");
            effects.push(Effect::Publish(ChatEvent::Disconnected {
                reason: "closed by client".to_string(),
            }));
        }
    }

    fn on_send(&mut self, text: String, effects: &mut Vec<Effect>) {
        match (self.state, self.session) {
            (ConnectionState::Connected, Some(session)) => {
                effects.push(Effect::WriteFrame { session, text });
            }
            (state, _) => debug!("Dropping outbound message while {}", state),
        }
    }

    fn on_opened(&mut self, session: SessionId, effects: &mut Vec<Effect>) {
        if !self.is_live(session) || self.state != ConnectionState::Connecting {
            debug!("Ignoring open of stale session {:?}", session);
            return;
        }

        let address = self.address.clone().unwrap_or_default();
        info!("Connected to {}", address);
        self.state = ConnectionState::Connected;
        self.counter = self.policy.reset();
        self.exhausted = false;
        self.reassembler.reset();
        effects.push(Effect::Publish(ChatEvent::Connected { address }));
    }

    fn on_frame(&mut self, session: SessionId, frame: &str, effects: &mut Vec<Effect>) {
        if !self.is_live(session) || self.state != ConnectionState::Connected {
            debug!("Ignoring frame from stale session {:?}", session);
            return;
        }

        if let Some(chunk) = self.reassembler.on_frame(frame) {
            let event = match chunk.kind {
                ChunkKind::Complete => ChatEvent::MessageComplete { text: chunk.text },
                ChunkKind::Partial => ChatEvent::MessagePartial { text: chunk.text },
            };
            effects.push(Effect::Publish(event));
        }
    }

    fn on_error(&mut self, session: SessionId, reason: String, effects: &mut Vec<Effect>) {
        if !self.is_live(session) {
            debug!("Ignoring error from stale session {:?}: {}", session, reason);
            return;
        }

        warn!("Transport error: {}", reason);
        effects.push(Effect::Publish(ChatEvent::TransportError { reason }));
    }

    fn on_closed(&mut self, session: SessionId, reason: String, effects: &mut Vec<Effect>) {
        if !self.is_live(session) {
            debug!("Ignoring close of stale session {:?}", session);
            return;
        }

        self.session = None;
        if self.state == ConnectionState::Connected {
            warn!("Connection lost: {}", reason);
            effects.push(Effect::Publish(ChatEvent::Disconnected { reason }));
        } else {
            warn!("Connection attempt failed: {}", reason);
        }

        self.schedule_retry(effects);
    }

    fn on_retry_elapsed(&mut self, timer: TimerId, effects: &mut Vec<Effect>) {
        if self.timer != Some(timer) || self.state != ConnectionState::Reconnecting {
            debug!("Ignoring stale retry timer {:?}", timer);
            return;
        }

        self.timer = None;
        match self.address.clone() {
            Some(address) => {
                info!("Reconnecting to {} (attempt {})", address, self.counter.attempts);
                self.start_attempt(address, effects);
            }
            None => self.state = ConnectionState::Disconnected,
        }
    }

    fn schedule_retry(&mut self, effects: &mut Vec<Effect>) {
        if self.policy.can_retry(&self.counter) {
            let (delay, counter) = self.policy.next(self.counter);
            self.counter = counter;
            let timer = TimerId(self.allocate_id());
            self.timer = Some(timer);
            self.state = ConnectionState::Reconnecting;
            info!("Reconnecting in {:?} (attempt {})", delay, counter.attempts);
            effects.push(Effect::ScheduleRetry { timer, delay });
            effects.push(Effect::Publish(ChatEvent::ReconnectScheduled {
                delay,
                attempt: counter.attempts,
            }));
        } else {
            self.state = ConnectionState::Disconnected;
            if !self.exhausted {
                self.exhausted = true;
                warn!("Reconnection budget exhausted after {} attempts", self.counter.attempts);
                effects.push(Effect::Publish(ChatEvent::ReconnectExhausted {
                    attempts: self.counter.attempts,
                }));
            }
        }
    }

    fn start_attempt(&mut self, address: String, effects: &mut Vec<Effect>) {
        let session = SessionId(self.allocate_id());
        self.session = Some(session);
        self.state = ConnectionState::Connecting;
        self.reassembler.reset();
        effects.push(Effect::OpenTransport { session, address });
    }

    /// Cancel the pending retry and close the live (or opening) transport
    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        if let Some(timer) = self.timer.take() {
            effects.push(Effect::CancelRetry { timer });
        }
        if let Some(session) = self.session.take() {
            effects.push(Effect::CloseTransport { session });
        }
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ExponentialBackoff;

    const ADDR: &str = "ws://127.0.0.1:8080/ws";

    fn machine(max_attempts: u32) -> ConnectionMachine {
        let policy = ExponentialBackoff::new(
            Duration::from_millis(1000),
            Duration::from_millis(60_000),
            1.5,
            max_attempts,
        );
        ConnectionMachine::new(Box::new(policy), '\0')
    }

    fn published(effects: &[Effect]) -> Vec<ChatEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Publish(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn opened_session(effects: &[Effect]) -> SessionId {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::OpenTransport { session, .. } => Some(*session),
                _ => None,
            })
            .expect("an OpenTransport effect")
    }

    fn scheduled(effects: &[Effect]) -> Option<(TimerId, Duration)> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleRetry { timer, delay } => Some((*timer, *delay)),
            _ => None,
        })
    }

    fn connect(m: &mut ConnectionMachine) -> SessionId {
        opened_session(&m.handle(Input::Connect { address: ADDR.into() }))
    }

    fn close(m: &mut ConnectionMachine, session: SessionId) -> Vec<Effect> {
        m.handle(Input::TransportClosed {
            session,
            reason: "gone".into(),
        })
    }

    #[test]
    fn test_connect_opens_transport() {
        let mut m = machine(3);
        let effects = m.handle(Input::Connect { address: ADDR.into() });
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.address(), Some(ADDR));
        assert!(matches!(
            effects.as_slice(),
            [Effect::OpenTransport { address, .. }] if address == ADDR
        ));
    }

    #[test]
    fn test_open_publishes_connected() {
        let mut m = machine(3);
        let session = connect(&mut m);
        let effects = m.handle(Input::TransportOpened { session });
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(
            published(&effects),
            vec![ChatEvent::Connected { address: ADDR.into() }]
        );
    }

    #[test]
    fn test_frames_are_reassembled_into_events() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });

        let mut events = Vec::new();
        for frame in ["Hel", "lo", "\0"] {
            events.extend(published(&m.handle(Input::TransportFrame {
                session,
                frame: frame.into(),
            })));
        }

        assert_eq!(
            events,
            vec![
                ChatEvent::MessageComplete { text: "Hel".into() },
                ChatEvent::MessagePartial { text: "lo".into() },
            ]
        );
    }

    #[test]
    fn test_backoff_sequence_then_exhaustion() {
        let mut m = machine(3);
        let mut session = connect(&mut m);
        let mut delays = Vec::new();

        for _ in 0..3 {
            let effects = close(&mut m, session);
            let (timer, delay) = scheduled(&effects).expect("retry scheduled");
            assert_eq!(m.state(), ConnectionState::Reconnecting);
            delays.push(delay.as_millis());
            session = opened_session(&m.handle(Input::RetryElapsed { timer }));
            assert_eq!(m.state(), ConnectionState::Connecting);
        }
        assert_eq!(delays, vec![1000, 1500, 2250]);
        assert!(!m.can_reconnect());

        let effects = close(&mut m, session);
        assert!(scheduled(&effects).is_none());
        assert_eq!(
            published(&effects),
            vec![ChatEvent::ReconnectExhausted { attempts: 3 }]
        );
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.pending_timer().is_none());
        assert!(m.live_session().is_none());
    }

    #[test]
    fn test_exhaustion_reported_once() {
        let mut m = machine(0);
        let session = connect(&mut m);
        let first = close(&mut m, session);
        assert_eq!(published(&first).len(), 1);

        // A late close for the same session is stale and stays silent
        let second = close(&mut m, session);
        assert!(second.is_empty());
    }

    #[test]
    fn test_explicit_connect_after_exhaustion_resets_budget() {
        let mut m = machine(1);
        let session = connect(&mut m);
        let effects = close(&mut m, session);
        let (timer, _) = scheduled(&effects).unwrap();
        let session = opened_session(&m.handle(Input::RetryElapsed { timer }));
        close(&mut m, session);
        assert!(!m.can_reconnect());

        connect(&mut m);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.counter().attempts, 0);
        assert!(m.can_reconnect());
    }

    #[test]
    fn test_successful_open_resets_counter() {
        let mut m = machine(5);
        let mut session = connect(&mut m);
        for _ in 0..2 {
            let (timer, _) = scheduled(&close(&mut m, session)).unwrap();
            session = opened_session(&m.handle(Input::RetryElapsed { timer }));
        }
        assert_eq!(m.counter().attempts, 2);

        m.handle(Input::TransportOpened { session });
        assert_eq!(m.counter().attempts, 0);
        assert_eq!(m.counter().current_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_lost_connection_publishes_disconnected_then_schedule() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });

        let events = published(&close(&mut m, session));
        assert_eq!(
            events,
            vec![
                ChatEvent::Disconnected { reason: "gone".into() },
                ChatEvent::ReconnectScheduled {
                    delay: Duration::from_millis(1000),
                    attempt: 1
                },
            ]
        );
    }

    #[test]
    fn test_send_while_disconnected_is_noop() {
        let mut m = machine(3);
        assert!(m.handle(Input::Send { text: "hi".into() }).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_while_connecting_is_dropped() {
        let mut m = machine(3);
        connect(&mut m);
        assert!(m.handle(Input::Send { text: "hi".into() }).is_empty());
    }

    #[test]
    fn test_send_while_connected_writes() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });
        let effects = m.handle(Input::Send { text: "bob hi".into() });
        assert_eq!(
            effects,
            vec![Effect::WriteFrame {
                session,
                text: "bob hi".into()
            }]
        );
    }

    #[test]
    fn test_transport_error_does_not_transition() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });
        let effects = m.handle(Input::TransportError {
            session,
            reason: "reset".into(),
        });
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(
            published(&effects),
            vec![ChatEvent::TransportError { reason: "reset".into() }]
        );
    }

    #[test]
    fn test_connect_while_reconnecting_cancels_timer() {
        let mut m = machine(3);
        let session = connect(&mut m);
        let (timer, _) = scheduled(&close(&mut m, session)).unwrap();

        let effects = m.handle(Input::Connect {
            address: "ws://other/ws".into(),
        });
        assert_eq!(effects[0], Effect::CancelRetry { timer });
        assert!(matches!(&effects[1], Effect::OpenTransport { address, .. } if address == "ws://other/ws"));

        // The cancelled timer firing late changes nothing
        assert!(m.handle(Input::RetryElapsed { timer }).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_connect_while_connected_closes_old_session_first() {
        let mut m = machine(3);
        let old = connect(&mut m);
        m.handle(Input::TransportOpened { session: old });

        let effects = m.handle(Input::Connect { address: ADDR.into() });
        assert_eq!(effects[0], Effect::CloseTransport { session: old });
        let new = opened_session(&effects);
        assert_ne!(old, new);

        // Events from the old session are ignored
        assert!(close(&mut m, old).is_empty());
        assert!(m
            .handle(Input::TransportFrame {
                session: old,
                frame: "late".into()
            })
            .is_empty());
        assert_eq!(m.live_session(), Some(new));
    }

    #[test]
    fn test_connect_while_connecting_cancels_in_flight_open() {
        let mut m = machine(3);
        let first = connect(&mut m);
        let effects = m.handle(Input::Connect { address: ADDR.into() });
        assert_eq!(effects[0], Effect::CloseTransport { session: first });
        assert!(m.handle(Input::TransportOpened { session: first }).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_stops_retries() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });

        let effects = m.handle(Input::Disconnect);
        assert_eq!(effects[0], Effect::CloseTransport { session });
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(published(&effects).len(), 1);

        // The transport's own close notification arrives afterwards
        assert!(close(&mut m, session).is_empty());
        assert!(m.pending_timer().is_none());
    }

    #[test]
    fn test_new_session_starts_with_fresh_reassembly() {
        let mut m = machine(3);
        let session = connect(&mut m);
        m.handle(Input::TransportOpened { session });
        m.handle(Input::TransportFrame {
            session,
            frame: "cut off".into(),
        });

        let (timer, _) = scheduled(&close(&mut m, session)).unwrap();
        let session = opened_session(&m.handle(Input::RetryElapsed { timer }));
        m.handle(Input::TransportOpened { session });
        let events = published(&m.handle(Input::TransportFrame {
            session,
            frame: "again".into(),
        }));
        assert_eq!(events, vec![ChatEvent::MessageComplete { text: "again".into() }]);
    }
}
