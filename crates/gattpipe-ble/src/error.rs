//! Error types for the btleplug central

use gattpipe_core::BackendError;
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the btleplug central
#[derive(Error, Debug)]
pub enum BleCentralError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerUnavailable(String),

    #[error("No BLE adapter at index {index} ({available} available)")]
    AdapterNotAvailable { index: usize, available: usize },

    #[error("Bluetooth permission denied")]
    PermissionDenied,

    #[error("Peripheral not seen during scan: {0}")]
    UnknownPeripheral(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Characteristic {0} has no client configuration descriptor")]
    MissingCccd(Uuid),

    #[error("BLE operation failed: {0}")]
    Operation(String),
}

impl From<btleplug::Error> for BleCentralError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::PermissionDenied => BleCentralError::PermissionDenied,
            other => BleCentralError::Operation(other.to_string()),
        }
    }
}

impl From<BleCentralError> for BackendError {
    fn from(err: BleCentralError) -> Self {
        match err {
            BleCentralError::PermissionDenied => BackendError::PermissionDenied,
            BleCentralError::ManagerUnavailable(_)
            | BleCentralError::AdapterNotAvailable { .. } => BackendError::RadioDisabled,
            BleCentralError::UnknownPeripheral(address) => BackendError::UnknownDevice(address),
            BleCentralError::CharacteristicNotFound(uuid) | BleCentralError::MissingCccd(uuid) => {
                BackendError::CharacteristicUnavailable(uuid)
            }
            BleCentralError::Operation(reason) => BackendError::Operation(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_maps_through() {
        let err: BleCentralError = btleplug::Error::PermissionDenied.into();
        assert_eq!(BackendError::from(err), BackendError::PermissionDenied);
    }

    #[test]
    fn test_missing_adapter_is_radio_disabled() {
        let err = BleCentralError::AdapterNotAvailable {
            index: 0,
            available: 0,
        };
        assert_eq!(BackendError::from(err), BackendError::RadioDisabled);
    }

    #[test]
    fn test_other_errors_keep_their_message() {
        let err: BleCentralError = btleplug::Error::NotConnected.into();
        match BackendError::from(err) {
            BackendError::Operation(reason) => assert!(!reason.is_empty()),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
