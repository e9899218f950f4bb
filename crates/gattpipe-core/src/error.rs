//! Error types for connecting, transferring and talking to the BLE backend

use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Connect Errors
// ----------------------------------------------------------------------------

/// Reasons a connect attempt ends without reaching Ready.
///
/// Every variant is terminal for the attempt; the caller decides whether to
/// call `connect` again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Bluetooth permissions are required")]
    PermissionDenied,

    #[error("Bluetooth is turned off")]
    RadioDisabled,

    #[error("Location services are off, BLE scanning needs them")]
    LocationServicesDisabled,

    #[error("Bluetooth scan could not be started: {0}")]
    ScanStartFailed(String),

    #[error("Peripheral not found, try again")]
    ScanTimeout,

    #[error("Link error: {0}")]
    LinkError(String),

    #[error("Peripheral service not found")]
    ServiceNotFound,

    #[error("Peripheral characteristic not found")]
    CharacteristicNotFound,

    #[error("Connection to the peripheral was lost")]
    SpontaneousDisconnect,

    #[error("A connect attempt is already in progress")]
    InProgress,

    #[error("Connection attempt cancelled by shutdown")]
    Cancelled,
}

// ----------------------------------------------------------------------------
// Transfer Errors
// ----------------------------------------------------------------------------

/// Reasons a `send` stops before every fragment was written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Not connected to the peripheral")]
    NotConnected,

    #[error("Write of chunk {chunk_index} failed: {reason}")]
    WriteFailed { chunk_index: usize, reason: String },
}

// ----------------------------------------------------------------------------
// Backend Errors
// ----------------------------------------------------------------------------

/// Errors reported by a [`CentralBackend`](crate::CentralBackend) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Bluetooth adapter not available or powered off")]
    RadioDisabled,

    #[error("Location services disabled")]
    LocationServicesDisabled,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Characteristic not available: {0}")]
    CharacteristicUnavailable(Uuid),

    #[error("{0}")]
    Operation(String),
}

impl BackendError {
    /// Map a backend failure during the pre-scan checks or scan start
    pub(crate) fn into_scan_error(self) -> ConnectError {
        match self {
            BackendError::PermissionDenied => ConnectError::PermissionDenied,
            BackendError::RadioDisabled => ConnectError::RadioDisabled,
            BackendError::LocationServicesDisabled => ConnectError::LocationServicesDisabled,
            other => ConnectError::ScanStartFailed(other.to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Invalid [`BridgeConfig`](crate::BridgeConfig) values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Fragment size must be greater than zero")]
    ZeroFragmentSize,

    #[error("Session id length must be greater than zero")]
    ZeroSessionIdLength,

    #[error("Scan timeout must be greater than zero")]
    ZeroScanTimeout,

    #[error("Device filter needs a name marker or an exact name")]
    EmptyDeviceFilter,
}
