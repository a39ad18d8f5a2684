//! Lifecycle state machine for the upstream exchange connection.
//!
//! The state machine gates whether ingestion proceeds: the adapter only
//! accepts raw updates while [`ConnectionState::Connected`]. Transition
//! events are observable through a broadcast channel, but no component
//! depends on them for correctness.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::error::Error;

/// State of the upstream exchange connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state before the first start
    Initializing,
    /// Start requested, connection being established
    Connecting,
    /// Connected, ingestion active
    Connected,
    /// The transport reported a failed connection; a new start recovers
    ErrorState,
    /// Stop requested, teardown in progress
    Stopping,
    /// Stopped; a new start reconnects
    Stopped,
}

/// Observable lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection reached [`ConnectionState::Connected`]
    Connected,
    /// The connection reached [`ConnectionState::Stopped`]
    Stopped,
}

/// Lifecycle state machine for one exchange connection.
///
/// Exactly one instance exists per adapter. All transitions are serialized
/// by an internal lock; the lock is never held while notifying subscribers.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionStateMachine {
    /// Create the state machine for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration requires an instrument
    /// list but none is present. Failing here keeps a misconfigured adapter
    /// from ever starting.
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            state: Mutex::new(ConnectionState::Initializing),
            events,
        })
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether ingestion is currently active
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to lifecycle transition events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Request a start.
    ///
    /// Transitions to [`ConnectionState::Connecting`] if the current state is
    /// `Initializing`, `ErrorState` or `Stopped`; otherwise a no-op.
    /// Returns whether the transition happened.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        info!(state = ?*state, "start requested");
        match *state {
            ConnectionState::Initializing
            | ConnectionState::ErrorState
            | ConnectionState::Stopped => {
                *state = ConnectionState::Connecting;
                true
            }
            _ => false,
        }
    }

    /// Signal that the connection was established.
    pub fn mark_connected(&self) {
        *self.state.lock() = ConnectionState::Connected;
        let _ = self.events.send(ConnectionEvent::Connected);
    }

    /// Signal that the transport lost or failed the connection.
    ///
    /// A subsequent [`ConnectionStateMachine::start`] recovers from this state.
    pub fn mark_error(&self) {
        *self.state.lock() = ConnectionState::ErrorState;
    }

    /// Request a stop.
    ///
    /// Transitions to [`ConnectionState::Stopping`]; idempotent when already
    /// stopped. Returns whether teardown should proceed.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, ConnectionState::Stopped | ConnectionState::Stopping) {
            return false;
        }
        *state = ConnectionState::Stopping;
        true
    }

    /// Signal that teardown completed.
    pub fn mark_stopped(&self) {
        *self.state.lock() = ConnectionState::Stopped;
        let _ = self.events.send(ConnectionEvent::Stopped);
        info!("connection stopped");
    }
}
