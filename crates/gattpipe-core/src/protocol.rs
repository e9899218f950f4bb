//! Protocol constants and peripheral reply parsing

use std::time::Duration;

use uuid::Uuid;

// ----------------------------------------------------------------------------
// GATT Identifiers
// ----------------------------------------------------------------------------

/// Service exposed by the peripheral
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);

/// Characteristic carrying chunk envelopes (write) and peripheral replies (notify)
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xabcd1234_ab12_cd34_ef56_abcdef123456);

/// Standard Client Characteristic Configuration descriptor (0x2902)
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

// ----------------------------------------------------------------------------
// Peripheral Identification
// ----------------------------------------------------------------------------

/// Substring that marks a compatible peripheral in its advertised name
pub const DEVICE_NAME_MARKER: &str = "ESP32";

/// Exact advertised name of the reference peripheral firmware
pub const DEVICE_EXACT_NAME: &str = "ESP32_JSON_BLE";

// ----------------------------------------------------------------------------
// Transfer and Timing Constants
// ----------------------------------------------------------------------------

/// Characters per chunk envelope payload
pub const FRAGMENT_SIZE: usize = 80;

/// Length of the random per-transfer session identifier
pub const SESSION_ID_LEN: usize = 9;

/// How long a scan may run without a matching advertisement
pub const SCAN_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Pause between two fragment writes
pub const CHUNK_PAUSE: Duration = Duration::from_millis(200);

/// Settle time between link establishment and service discovery
pub const DISCOVERY_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound on link establishment
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

// ----------------------------------------------------------------------------
// Peripheral Replies
// ----------------------------------------------------------------------------

const REPLY_COMPLETE: &str = "TAMAM";
const REPLY_ERROR: &str = "HATA";
const REPLY_CHUNK_ACK_PREFIX: &str = "OK_";

/// A notification pushed by the peripheral over the characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralReply {
    /// Every chunk of a session arrived and the reassembled JSON parsed
    Complete,
    /// The peripheral failed to reassemble or parse a session
    Error,
    /// Intermediate acknowledgment of one chunk index
    ChunkAck(u32),
    /// Any other text
    Message(String),
}

impl PeripheralReply {
    /// Classify a raw notification payload
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();

        match text {
            REPLY_COMPLETE => PeripheralReply::Complete,
            REPLY_ERROR => PeripheralReply::Error,
            _ => text
                .strip_prefix(REPLY_CHUNK_ACK_PREFIX)
                .and_then(|index| index.parse().ok())
                .map(PeripheralReply::ChunkAck)
                .unwrap_or_else(|| PeripheralReply::Message(text.to_string())),
        }
    }

    /// Whether this reply reports a failure on the peripheral side
    pub fn is_error(&self) -> bool {
        matches!(self, PeripheralReply::Error)
    }
}

impl std::fmt::Display for PeripheralReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeripheralReply::Complete => write!(f, "peripheral confirmed: {}", REPLY_COMPLETE),
            PeripheralReply::Error => write!(f, "peripheral reported {}", REPLY_ERROR),
            PeripheralReply::ChunkAck(index) => write!(f, "peripheral acknowledged chunk {}", index),
            PeripheralReply::Message(text) => write!(f, "peripheral message: {}", text),
        }
    }
}
