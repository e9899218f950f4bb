//! Connection State Machine
//!
//! The lifecycle of the single peripheral connection as a tagged enum. The
//! characteristic handle lives inside [`ConnectionState::Ready`], so a Ready
//! state without a handle cannot be constructed and leaving Ready discards the
//! handle in the same step.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::ConnectError;
use crate::events::{BridgeEvent, EventSink};

// ----------------------------------------------------------------------------
// Handles
// ----------------------------------------------------------------------------

/// Capability token for the discovered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub address: String,
    pub uuid: Uuid,
}

/// Capability token for the writable characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicHandle {
    pub service: ServiceHandle,
    pub uuid: Uuid,
}

impl CharacteristicHandle {
    pub fn address(&self) -> &str {
        &self.service.address
    }
}

/// Data held while the connection is usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyLink {
    pub handle: CharacteristicHandle,
    /// Set once the CCCD write completed; does not gate writes
    pub notifications_enabled: bool,
}

// ----------------------------------------------------------------------------
// Connection State Types
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting {
        address: String,
    },
    DiscoveringServices {
        address: String,
    },
    Ready(ReadyLink),
    Disconnected,
    Failed(ConnectError),
}

/// Inputs that drive [`ConnectionState::transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StartScan,
    /// Permission, radio or location check failed before scanning
    PreflightFailed(ConnectError),
    ScanFailed(String),
    ScanTimedOut,
    DeviceMatched { address: String },
    LinkEstablished,
    LinkFailed(String),
    ServicesResolved(CharacteristicHandle),
    ServiceMissing,
    CharacteristicMissing,
    NotificationsEnabled,
    LinkLost,
    Teardown,
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub new_state: ConnectionState,
    pub audit_entry: AuditEntry,
}

/// Audit trail entry for state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub from_state: &'static str,
    pub to_state: &'static str,
    pub event: String,
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on event {event}")]
    InvalidTransition {
        from_state: &'static str,
        event: String,
    },
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl ConnectionState {
    /// Get current state name for logging/audit
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Scanning => "Scanning",
            ConnectionState::Connecting { .. } => "Connecting",
            ConnectionState::DiscoveringServices { .. } => "DiscoveringServices",
            ConnectionState::Ready(_) => "Ready",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Failed(_) => "Failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready(_))
    }

    /// A connect attempt is running
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ConnectionState::Scanning
                | ConnectionState::Connecting { .. }
                | ConnectionState::DiscoveringServices { .. }
        )
    }

    /// Handle usable for writes, only while Ready
    pub fn handle(&self) -> Option<&CharacteristicHandle> {
        match self {
            ConnectionState::Ready(link) => Some(&link.handle),
            _ => None,
        }
    }

    /// Address of the peripheral a link may exist with
    pub fn address(&self) -> Option<&str> {
        match self {
            ConnectionState::Connecting { address }
            | ConnectionState::DiscoveringServices { address } => Some(address),
            ConnectionState::Ready(link) => Some(link.handle.address()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ConnectError> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Compute the state that follows `event`
    pub fn transition(
        &self,
        event: ConnectionEvent,
    ) -> Result<StateTransition, StateTransitionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let from_state = self.state_name();
        let event_name = format!("{:?}", event);

        let new_state = match (self, event) {
            // From a resting state
            (S::Idle | S::Disconnected | S::Failed(_), E::StartScan) => S::Scanning,
            (S::Idle | S::Disconnected | S::Failed(_), E::PreflightFailed(reason)) => {
                S::Failed(reason)
            }

            // From Scanning
            (S::Scanning, E::ScanFailed(reason)) => {
                S::Failed(ConnectError::ScanStartFailed(reason))
            }
            (S::Scanning, E::ScanTimedOut) => S::Failed(ConnectError::ScanTimeout),
            (S::Scanning, E::DeviceMatched { address }) => S::Connecting { address },

            // From Connecting
            (S::Connecting { address }, E::LinkEstablished) => S::DiscoveringServices {
                address: address.clone(),
            },

            // From DiscoveringServices
            (S::DiscoveringServices { address }, E::ServicesResolved(handle))
                if handle.address() == address.as_str() =>
            {
                S::Ready(ReadyLink {
                    handle,
                    notifications_enabled: false,
                })
            }
            (S::DiscoveringServices { .. }, E::ServiceMissing) => {
                S::Failed(ConnectError::ServiceNotFound)
            }
            (S::DiscoveringServices { .. }, E::CharacteristicMissing) => {
                S::Failed(ConnectError::CharacteristicNotFound)
            }

            (S::Connecting { .. } | S::DiscoveringServices { .. }, E::LinkFailed(reason)) => {
                S::Failed(ConnectError::LinkError(reason))
            }

            // From Ready
            (S::Ready(link), E::NotificationsEnabled) => S::Ready(ReadyLink {
                handle: link.handle.clone(),
                notifications_enabled: true,
            }),
            (S::Ready(_), E::LinkLost) => S::Disconnected,

            // Link loss before Ready never yields a usable state
            (
                S::Scanning | S::Connecting { .. } | S::DiscoveringServices { .. },
                E::LinkLost,
            ) => S::Failed(ConnectError::SpontaneousDisconnect),

            // Universal transitions
            (_, E::Teardown) => S::Idle,

            // Invalid transitions
            _ => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state,
                    event: event_name,
                });
            }
        };

        let audit_entry = AuditEntry {
            from_state,
            to_state: new_state.state_name(),
            event: event_name,
        };

        Ok(StateTransition {
            new_state,
            audit_entry,
        })
    }

    /// Human-readable status line for the front end
    pub fn status_text(&self) -> String {
        match self {
            ConnectionState::Idle => "Idle".to_string(),
            ConnectionState::Scanning => "Searching for peripheral".to_string(),
            ConnectionState::Connecting { address } => format!("Connecting to {}", address),
            ConnectionState::DiscoveringServices { address } => {
                format!("Connected to {}, discovering services", address)
            }
            ConnectionState::Ready(link) => format!("Ready ({})", link.handle.address()),
            ConnectionState::Disconnected => "Disconnected from peripheral".to_string(),
            ConnectionState::Failed(reason) => format!("Connection failed: {}", reason),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

// ----------------------------------------------------------------------------
// Shared Machine
// ----------------------------------------------------------------------------

/// The single mutual-exclusion domain around [`ConnectionState`].
///
/// A transition is applied, audited and announced to the sink while the lock
/// is held, so callbacks arriving from different tasks observe transitions one
/// at a time and in full.
pub struct ConnectionMachine {
    state: Mutex<ConnectionState>,
    sink: Arc<dyn EventSink>,
}

impl ConnectionMachine {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Idle),
            sink,
        }
    }

    /// Apply `event`, returning the resulting state
    pub async fn apply(
        &self,
        event: ConnectionEvent,
    ) -> Result<ConnectionState, StateTransitionError> {
        let applied = self.apply_if(|_| true, event).await?;
        Ok(applied.map(|(_, current)| current).unwrap_or_default())
    }

    /// Apply `event` only if `guard` accepts the current state.
    ///
    /// Returns `Ok(None)` when the guard rejected the state.
    pub async fn apply_if<F>(
        &self,
        guard: F,
        event: ConnectionEvent,
    ) -> Result<Option<(ConnectionState, ConnectionState)>, StateTransitionError>
    where
        F: FnOnce(&ConnectionState) -> bool,
    {
        let mut state = self.state.lock().await;
        if !guard(&*state) {
            return Ok(None);
        }

        let transition = state.transition(event)?;
        debug!(
            from = transition.audit_entry.from_state,
            to = transition.audit_entry.to_state,
            event = %transition.audit_entry.event,
            "connection transition"
        );

        let previous = std::mem::replace(&mut *state, transition.new_state);
        if previous.state_name() != state.state_name() {
            self.sink
                .emit(BridgeEvent::status(state.status_text(), state.is_ready()));
        }

        Ok(Some((previous, state.clone())))
    }

    pub async fn snapshot(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.is_ready()
    }

    pub async fn ready_handle(&self) -> Option<CharacteristicHandle> {
        self.state.lock().await.handle().cloned()
    }

    pub async fn failure(&self) -> Option<ConnectError> {
        self.state.lock().await.failure().cloned()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
