//! Connection state machine.
//!
//! The stream driver feeds transport events in and executes the actions that
//! come out. Keeping the transitions here, free of I/O, lets reconnection
//! behaviour be checked in isolation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Connection state published to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open and subscribe handshake sent.
    Subscribed,
    /// Transport lost while subscribed; a reconnect is scheduled.
    Degraded(String),
}

impl ConnectionState {
    /// Returns true if frames are flowing.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// Returns true if the UI should show the link as down.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Degraded(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Degraded(reason) => write!(f, "Degraded ({})", reason),
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// `open()` was called.
    Open,
    /// The transport handshake completed.
    TransportOpened,
    /// The transport could not be opened.
    TransportFailed(String),
    /// An open transport closed or errored.
    TransportLost(String),
    /// The reconnect timer fired.
    ReconnectDue,
    /// The reconnect cap was reached.
    GiveUp,
    /// The owning session is being torn down.
    Teardown,
}

/// Work the driver must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the transport.
    OpenTransport,
    /// Send the subscribe handshake for the live channel set.
    SendHandshake,
    /// Publish the new state on the connectivity channel.
    Notify(ConnectionState),
    /// Start the reconnect timer.
    ScheduleReconnect,
    /// Stop a pending reconnect timer.
    CancelReconnect,
}

/// Connection state machine.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: ConnectionState,
    reconnect_pending: bool,
    reconnect_attempts: u32,
}

impl StateMachine {
    /// Creates a machine in `Disconnected`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Returns true while a reconnect timer is scheduled.
    #[must_use]
    pub const fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Number of reconnect attempts since the last successful open.
    #[must_use]
    pub const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Applies an event and returns the actions to perform.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidTransition`] if the event is not valid
    /// in the current state; the state is left untouched.
    pub fn handle(&mut self, event: StreamEvent) -> Result<Vec<Action>, StreamError> {
        use ConnectionState as S;
        use StreamEvent as E;

        let actions = match (self.state.clone(), event) {
            (S::Disconnected, E::Open) if !self.reconnect_pending => {
                self.enter(S::Connecting, vec![Action::OpenTransport])
            }
            (S::Connecting, E::TransportOpened) => {
                self.reconnect_attempts = 0;
                let mut actions = vec![Action::SendHandshake];
                actions.extend(self.enter(S::Subscribed, Vec::new()));
                actions
            }
            (S::Connecting, E::TransportFailed(_)) => {
                let mut actions = self.enter(S::Disconnected, Vec::new());
                actions.extend(self.schedule_reconnect());
                actions
            }
            (S::Subscribed, E::TransportLost(reason)) => {
                let mut actions = self.enter(S::Degraded(reason), Vec::new());
                actions.extend(self.schedule_reconnect());
                actions
            }
            (S::Disconnected | S::Degraded(_), E::ReconnectDue) if self.reconnect_pending => {
                self.reconnect_pending = false;
                self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
                self.enter(S::Connecting, vec![Action::OpenTransport])
            }
            (S::Disconnected | S::Degraded(_), E::GiveUp) if self.reconnect_pending => {
                self.reconnect_pending = false;
                self.enter(S::Disconnected, vec![Action::CancelReconnect])
            }
            (_, E::Teardown) => {
                let mut actions = Vec::new();
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    actions.push(Action::CancelReconnect);
                }
                actions.extend(self.enter(S::Disconnected, Vec::new()));
                actions
            }
            (state, event) => {
                return Err(StreamError::InvalidTransition {
                    state: state.to_string(),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(actions)
    }

    /// Moves to `next`, appending a notification when the state changes.
    fn enter(&mut self, next: ConnectionState, mut actions: Vec<Action>) -> Vec<Action> {
        if self.state != next {
            self.state = next.clone();
            actions.push(Action::Notify(next));
        }
        actions
    }

    fn schedule_reconnect(&mut self) -> Option<Action> {
        if self.reconnect_pending {
            return None;
        }
        self.reconnect_pending = true;
        Some(Action::ScheduleReconnect)
    }
}
