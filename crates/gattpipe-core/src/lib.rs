//! Chunked JSON transfer to a BLE peripheral
//!
//! This crate holds the platform-independent half of gattpipe: it connects to a
//! single peripheral acting as BLE central and moves arbitrarily large text
//! payloads across a characteristic whose writes are only a few dozen bytes.
//!
//! ## Architecture
//!
//! - [`protocol`] - GATT identifiers, timing constants, peripheral replies
//! - [`chunker`] - Payload fragmentation and the chunk envelope wire format
//! - [`filter`] - Advertisement matching
//! - [`state`] - Connection state machine and its mutual-exclusion wrapper
//! - [`backend`] - The [`CentralBackend`] seam implemented per platform
//! - [`transfer`] - Ordered, acknowledged chunk writes with progress
//! - [`events`] - The event sink boundary towards the front end
//! - [`bridge`] - The caller-facing `connect` / `send` / `is_connected` facade
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gattpipe_core::{Bridge, BridgeConfig, CentralBackend, TracingSink};
//!
//! # async fn example<B: CentralBackend>(backend: B) -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = Bridge::new(backend, BridgeConfig::default(), Arc::new(TracingSink))?;
//!
//! bridge.connect().await?;
//! bridge.send(r#"{"code": "print('hello')"}"#).await?;
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bridge;
pub mod chunker;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod protocol;
pub mod state;
pub mod transfer;

// Public API exports
pub use backend::{
    AdvertisementStream, CentralBackend, DiscoveredGatt, DiscoveredService, LinkEvent,
    LinkEventStream, NotificationStream,
};
pub use bridge::Bridge;
pub use chunker::{split_fragments, ChunkEnvelope, ChunkPlan, SessionId};
pub use config::BridgeConfig;
pub use error::{BackendError, ConfigError, ConnectError, TransferError};
pub use events::{BridgeEvent, ChannelSink, EventSink, FanoutSink, Severity, TracingSink};
pub use filter::{Advertisement, DeviceFilter, ScanVerdict};
pub use protocol::{
    PeripheralReply, CHARACTERISTIC_UUID, CLIENT_CHARACTERISTIC_CONFIG_UUID, SERVICE_UUID,
};
pub use state::{
    CharacteristicHandle, ConnectionEvent, ConnectionMachine, ConnectionState, ServiceHandle,
    StateTransitionError,
};
pub use transfer::{ChunkedTransfer, TransferReport};
