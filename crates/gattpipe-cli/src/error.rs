//! Error handling for the gattpipe CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bridge configuration: {0}")]
    BridgeConfig(#[from] gattpipe_core::ConfigError),

    #[error("BLE initialization failed: {0}")]
    Ble(#[from] gattpipe_ble::BleCentralError),

    #[error("BLE backend error: {0}")]
    Backend(#[from] gattpipe_core::BackendError),

    #[error("Connection failed: {0}")]
    Connect(#[from] gattpipe_core::ConnectError),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] gattpipe_core::TransferError),

    #[error("No payload given, use --file or --json")]
    NoPayload,

    #[error("Payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
