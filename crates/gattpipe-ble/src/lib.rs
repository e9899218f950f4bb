//! btleplug central backend for gattpipe
//!
//! This crate implements [`gattpipe_core::CentralBackend`] on top of
//! `btleplug`, so the connection lifecycle and chunked transfer in
//! `gattpipe-core` can drive a real Bluetooth adapter.
//!
//! ## Architecture
//!
//! - [`config`] - Adapter selection and scan settings
//! - [`error`] - Error types specific to the btleplug central
//! - [`central`] - The [`BtleplugCentral`] backend
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gattpipe_ble::{BleCentralConfig, BtleplugCentral};
//! use gattpipe_core::{Bridge, BridgeConfig, TracingSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let central = BtleplugCentral::new(BleCentralConfig::default()).await?;
//! let bridge = Bridge::new(central, BridgeConfig::default(), Arc::new(TracingSink))?;
//!
//! bridge.connect().await?;
//! bridge.send(r#"{"code": "blink()"}"#).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! Scanning and central-mode GATT access work wherever btleplug does (BlueZ on
//! Linux, Core Bluetooth on macOS, WinRT on Windows). Location services only
//! gate scanning on mobile platforms, so preflight never reports them here.

pub mod central;
pub mod config;
pub mod error;

// Public API exports
pub use central::BtleplugCentral;
pub use config::BleCentralConfig;
pub use error::BleCentralError;
