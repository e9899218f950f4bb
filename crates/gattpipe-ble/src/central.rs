//! Central role on top of btleplug
//!
//! Peripherals are tracked by their platform id. Core Bluetooth reports the
//! same zeroed hardware address for every device, so the id string doubles as
//! the address handed to the bridge. Everything the bridge later asks for
//! (connect, discover, write) is looked up by that key, so a device must have
//! been seen by a scan first.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter, Service,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use gattpipe_core::{
    Advertisement, AdvertisementStream, BackendError, CentralBackend, CharacteristicHandle,
    DiscoveredGatt, DiscoveredService, LinkEvent, LinkEventStream, NotificationStream,
    CLIENT_CHARACTERISTIC_CONFIG_UUID, SERVICE_UUID,
};

use crate::config::BleCentralConfig;
use crate::error::BleCentralError;

type PeripheralMap = Arc<RwLock<PeripheralRegistry<Peripheral>>>;

// ----------------------------------------------------------------------------
// Peripheral Registry
// ----------------------------------------------------------------------------

/// Peripherals seen by the scan, keyed by platform id string
#[derive(Debug)]
pub(crate) struct PeripheralRegistry<P> {
    seen: HashMap<String, P>,
}

impl<P> Default for PeripheralRegistry<P> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }
}

impl<P: Clone> PeripheralRegistry<P> {
    /// Record a sighting and describe it for the device filter
    pub(crate) fn remember(
        &mut self,
        key: String,
        local_name: Option<String>,
        peripheral: P,
    ) -> Advertisement {
        self.seen.insert(key.clone(), peripheral);
        Advertisement::new(local_name, key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<P> {
        self.seen.get(key).cloned()
    }

    /// Disconnects of peripherals we never saw are not ours to report
    pub(crate) fn link_event(&self, key: String) -> Option<LinkEvent> {
        self.seen
            .contains_key(&key)
            .then_some(LinkEvent::Disconnected { address: key })
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}

// ----------------------------------------------------------------------------
// Central Implementation
// ----------------------------------------------------------------------------

/// [`CentralBackend`] backed by the host Bluetooth adapter
pub struct BtleplugCentral {
    config: BleCentralConfig,
    adapter: Adapter,
    peripherals: PeripheralMap,
}

impl BtleplugCentral {
    /// Open the configured adapter
    pub async fn new(config: BleCentralConfig) -> Result<Self, BleCentralError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleCentralError::ManagerUnavailable(e.to_string()))?;

        let adapters = manager.adapters().await?;
        let adapter = adapters.get(config.adapter_index).cloned().ok_or(
            BleCentralError::AdapterNotAvailable {
                index: config.adapter_index,
                available: adapters.len(),
            },
        )?;

        info!(index = config.adapter_index, "BLE adapter initialized");
        Ok(Self {
            config,
            adapter,
            peripherals: Arc::new(RwLock::new(PeripheralRegistry::default())),
        })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral, BleCentralError> {
        self.peripherals
            .read()
            .await
            .get(address)
            .ok_or_else(|| BleCentralError::UnknownPeripheral(address.to_string()))
    }

    async fn characteristic(
        &self,
        handle: &CharacteristicHandle,
    ) -> Result<(Peripheral, Characteristic), BleCentralError> {
        let peripheral = self.peripheral(handle.address()).await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service.uuid)
            .ok_or(BleCentralError::CharacteristicNotFound(handle.uuid))?;
        Ok((peripheral, characteristic))
    }
}

// ----------------------------------------------------------------------------
// Event Translation
// ----------------------------------------------------------------------------

/// Resolve a discovery event into an advertisement, remembering the peripheral
async fn advertisement_for(
    adapter: &Adapter,
    peripherals: &PeripheralMap,
    id: &PeripheralId,
) -> Option<Advertisement> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    debug!(id = %id, address = %properties.address, "advertisement");

    Some(
        peripherals
            .write()
            .await
            .remember(id.to_string(), properties.local_name, peripheral),
    )
}

/// Preflight verdict for the adapter's reported power state
pub(crate) fn radio_check(state: CentralState) -> Result<(), BackendError> {
    match state {
        CentralState::PoweredOff => Err(BackendError::RadioDisabled),
        // Some stacks cannot tell; let the scan decide
        _ => Ok(()),
    }
}

/// Flatten btleplug's service tree into the core's discovery result
pub(crate) fn discovered_gatt(services: &BTreeSet<Service>) -> DiscoveredGatt {
    DiscoveredGatt {
        services: services
            .iter()
            .map(|service| DiscoveredService {
                uuid: service.uuid,
                characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
            })
            .collect(),
    }
}

pub(crate) fn has_cccd(characteristic: &Characteristic) -> bool {
    characteristic
        .descriptors
        .iter()
        .any(|d| d.uuid == CLIENT_CHARACTERISTIC_CONFIG_UUID)
}

// ----------------------------------------------------------------------------
// Backend Trait
// ----------------------------------------------------------------------------

#[async_trait]
impl CentralBackend for BtleplugCentral {
    async fn preflight(&self) -> Result<(), BackendError> {
        // Missing permission surfaces as an error on the first adapter query
        let info = self
            .adapter
            .adapter_info()
            .await
            .map_err(BleCentralError::from)?;
        let state = self
            .adapter
            .adapter_state()
            .await
            .map_err(BleCentralError::from)?;
        debug!(adapter = %info, state = ?state, "adapter available");

        radio_check(state).inspect_err(|_| warn!(adapter = %info, "radio is powered off"))
    }

    async fn start_scan(&self) -> Result<AdvertisementStream, BackendError> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(BleCentralError::from)?;

        let filter = if self.config.filter_by_service {
            ScanFilter {
                services: vec![SERVICE_UUID],
            }
        } else {
            ScanFilter::default()
        };
        self.adapter
            .start_scan(filter)
            .await
            .map_err(BleCentralError::from)?;
        info!("started BLE scan");

        let adapter = self.adapter.clone();
        let peripherals = Arc::clone(&self.peripherals);
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let peripherals = Arc::clone(&peripherals);
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        advertisement_for(&adapter, &peripherals, &id).await
                    }
                    _ => None,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), BackendError> {
        self.adapter
            .stop_scan()
            .await
            .map_err(BleCentralError::from)?;
        let known = self.peripherals.read().await.len();
        debug!(known, "stopped BLE scan");
        Ok(())
    }

    async fn link_events(&self) -> Result<LinkEventStream, BackendError> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(BleCentralError::from)?;

        let peripherals = Arc::clone(&self.peripherals);
        let stream = events.filter_map(move |event| {
            let peripherals = Arc::clone(&peripherals);
            async move {
                match event {
                    CentralEvent::DeviceDisconnected(id) => {
                        peripherals.read().await.link_event(id.to_string())
                    }
                    _ => None,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn connect(&self, address: &str) -> Result<(), BackendError> {
        let peripheral = self.peripheral(address).await?;
        peripheral.connect().await.map_err(BleCentralError::from)?;
        info!(address, "connected");
        Ok(())
    }

    async fn discover(&self, address: &str) -> Result<DiscoveredGatt, BackendError> {
        let peripheral = self.peripheral(address).await?;
        peripheral
            .discover_services()
            .await
            .map_err(BleCentralError::from)?;

        let gatt = discovered_gatt(&peripheral.services());
        debug!(address, services = gatt.services.len(), "services discovered");
        Ok(gatt)
    }

    async fn enable_notifications(
        &self,
        handle: &CharacteristicHandle,
    ) -> Result<NotificationStream, BackendError> {
        let (peripheral, characteristic) = self.characteristic(handle).await?;

        if !has_cccd(&characteristic) {
            return Err(BleCentralError::MissingCccd(characteristic.uuid).into());
        }

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(BleCentralError::from)?;
        let notifications = peripheral
            .notifications()
            .await
            .map_err(BleCentralError::from)?;

        let uuid = characteristic.uuid;
        let stream = notifications.filter_map(move |notification| async move {
            (notification.uuid == uuid).then_some(notification.value)
        });

        Ok(stream.boxed())
    }

    async fn write(&self, handle: &CharacteristicHandle, data: &[u8]) -> Result<(), BackendError> {
        let (peripheral, characteristic) = self.characteristic(handle).await?;

        peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(BleCentralError::from)?;
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), BackendError> {
        let Ok(peripheral) = self.peripheral(address).await else {
            return Ok(());
        };

        match peripheral.is_connected().await {
            Ok(true) => {
                peripheral
                    .disconnect()
                    .await
                    .map_err(BleCentralError::from)?;
                info!(address, "disconnected");
            }
            Ok(false) => {}
            Err(e) => warn!(address, "could not query link state: {}", e),
        }
        Ok(())
    }
}
