//! Event sink boundary towards the front end
//!
//! Components report through a closed set of [`BridgeEvent`]s. Emission is
//! fire-and-forget: a sink must never block the emitter and may drop events
//! when nobody is listening.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Severity attached to user-facing alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Error => write!(f, "error"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Everything the core reports to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Free-text log line
    Log { text: String },
    /// Message that should be shown prominently
    Alert { text: String, severity: Severity },
    /// Connection status change
    Status { text: String, connected: bool },
    ConnectSucceeded,
    ConnectFailed,
    /// Percentage of fragments acknowledged so far
    SendProgress { percent: u8 },
    SendComplete,
    SendFailed,
}

impl BridgeEvent {
    pub fn log(text: impl Into<String>) -> Self {
        BridgeEvent::Log { text: text.into() }
    }

    pub fn alert(text: impl Into<String>, severity: Severity) -> Self {
        BridgeEvent::Alert {
            text: text.into(),
            severity,
        }
    }

    pub fn status(text: impl Into<String>, connected: bool) -> Self {
        BridgeEvent::Status {
            text: text.into(),
            connected,
        }
    }

    /// Whether this event ends a connect or send operation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BridgeEvent::ConnectSucceeded
                | BridgeEvent::ConnectFailed
                | BridgeEvent::SendComplete
                | BridgeEvent::SendFailed
        )
    }
}

// ----------------------------------------------------------------------------
// Sink Trait
// ----------------------------------------------------------------------------

/// One-directional, non-blocking event consumer
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BridgeEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: BridgeEvent) {
        (**self).emit(event)
    }
}

// ----------------------------------------------------------------------------
// Sink Implementations
// ----------------------------------------------------------------------------

/// Forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: BridgeEvent) {
        // A closed receiver means the front end is gone; nothing left to inform.
        let _ = self.tx.send(event);
    }
}

/// Renders events as tracing records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Log { text } => tracing::info!("{}", text),
            BridgeEvent::Alert {
                text,
                severity: Severity::Error,
            } => tracing::error!("{}", text),
            BridgeEvent::Alert { text, severity } => tracing::info!("[{}] {}", severity, text),
            BridgeEvent::Status { text, connected } => {
                tracing::info!(connected, "status: {}", text)
            }
            BridgeEvent::SendProgress { percent } => tracing::debug!("send progress {}%", percent),
            other => tracing::info!("{:?}", other),
        }
    }
}

/// Delivers every event to each inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: BridgeEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
