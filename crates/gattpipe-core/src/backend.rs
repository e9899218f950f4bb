//! Abstraction over the platform BLE central stack

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::{BackendError, ConnectError};
use crate::filter::Advertisement;
use crate::state::{CharacteristicHandle, ServiceHandle};

pub type AdvertisementStream = BoxStream<'static, Advertisement>;
pub type LinkEventStream = BoxStream<'static, LinkEvent>;
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// Unsolicited link-level events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { address: String },
}

// ----------------------------------------------------------------------------
// Discovery Results
// ----------------------------------------------------------------------------

/// One GATT service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Services found on a connected peripheral
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredGatt {
    pub services: Vec<DiscoveredService>,
}

impl DiscoveredGatt {
    /// Locate `characteristic` inside `service`
    pub fn resolve(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<CharacteristicHandle, ConnectError> {
        let found = self
            .services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or(ConnectError::ServiceNotFound)?;

        if !found.characteristics.contains(&characteristic) {
            return Err(ConnectError::CharacteristicNotFound);
        }

        Ok(CharacteristicHandle {
            service: ServiceHandle {
                address: address.to_string(),
                uuid: service,
            },
            uuid: characteristic,
        })
    }
}

// ----------------------------------------------------------------------------
// Backend Trait
// ----------------------------------------------------------------------------

/// Central-role operations the bridge drives.
///
/// Every call is one gated step of the connection lifecycle; the bridge decides
/// ordering, timeouts and state, the backend only talks to the radio.
#[async_trait]
pub trait CentralBackend: Send + Sync + 'static {
    /// Platform checks (permissions, radio, location) before any scan
    async fn preflight(&self) -> Result<(), BackendError>;

    /// Begin scanning; the stream yields every advertisement seen
    async fn start_scan(&self) -> Result<AdvertisementStream, BackendError>;

    /// Stop scanning. Must succeed when no scan is running.
    async fn stop_scan(&self) -> Result<(), BackendError>;

    /// Stream of unsolicited link events for all peripherals
    async fn link_events(&self) -> Result<LinkEventStream, BackendError>;

    /// Establish the link with the peripheral at `address`
    async fn connect(&self, address: &str) -> Result<(), BackendError>;

    /// Discover services and characteristics on a connected peripheral
    async fn discover(&self, address: &str) -> Result<DiscoveredGatt, BackendError>;

    /// Enable notifications by writing the client characteristic configuration
    /// descriptor, returning the notification payloads
    async fn enable_notifications(
        &self,
        handle: &CharacteristicHandle,
    ) -> Result<NotificationStream, BackendError>;

    /// Write one value and resolve only once the peripheral acknowledged it
    async fn write(&self, handle: &CharacteristicHandle, data: &[u8]) -> Result<(), BackendError>;

    /// Release the link. Must succeed for unknown or already closed links.
    async fn disconnect(&self, address: &str) -> Result<(), BackendError>;
}
