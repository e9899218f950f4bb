//! Bridge configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Tunables for scanning, connecting and chunked transfer.
///
/// GATT identifiers are protocol constants and deliberately absent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Characters per chunk envelope
    pub fragment_size: usize,
    /// Length of the random session id
    pub session_id_len: usize,
    /// Maximum time to scan for the peripheral
    #[serde(with = "duration_ms")]
    pub scan_timeout: Duration,
    /// Maximum time to wait for the link to come up
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Pause between link establishment and service discovery
    #[serde(with = "duration_ms")]
    pub discovery_delay: Duration,
    /// Pause between two fragment writes
    #[serde(with = "duration_ms")]
    pub chunk_pause: Duration,
    /// Substring identifying the peripheral by advertised name
    pub device_name_marker: String,
    /// Exact advertised name of the peripheral
    pub device_exact_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fragment_size: protocol::FRAGMENT_SIZE,
            session_id_len: protocol::SESSION_ID_LEN,
            scan_timeout: protocol::SCAN_TIMEOUT,
            connect_timeout: protocol::CONNECT_TIMEOUT,
            discovery_delay: protocol::DISCOVERY_DELAY,
            chunk_pause: protocol::CHUNK_PAUSE,
            device_name_marker: protocol::DEVICE_NAME_MARKER.to_string(),
            device_exact_name: protocol::DEVICE_EXACT_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with the protocol defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the delay before service discovery
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    /// Set the pause between fragment writes
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    /// Set fragment size
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Set the name marker and exact name used by the device filter
    pub fn with_device_names(mut self, marker: String, exact_name: String) -> Self {
        self.device_name_marker = marker;
        self.device_exact_name = exact_name;
        self
    }

    /// Reject values the transfer protocol cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fragment_size == 0 {
            return Err(ConfigError::ZeroFragmentSize);
        }
        if self.session_id_len == 0 {
            return Err(ConfigError::ZeroSessionIdLength);
        }
        if self.scan_timeout.is_zero() {
            return Err(ConfigError::ZeroScanTimeout);
        }
        if self.device_name_marker.is_empty() && self.device_exact_name.is_empty() {
            return Err(ConfigError::EmptyDeviceFilter);
        }
        Ok(())
    }
}

/// Durations are stored as integer milliseconds in config files
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
