//! Shared test utilities: a scripted in-memory central and a recording sink

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};

use gattpipe_core::{
    Advertisement, AdvertisementStream, BackendError, Bridge, BridgeConfig, BridgeEvent,
    CentralBackend, CharacteristicHandle, ChunkEnvelope, DiscoveredGatt, DiscoveredService,
    EventSink, LinkEvent, LinkEventStream, NotificationStream, Severity, CHARACTERISTIC_UUID,
    SERVICE_UUID,
};

pub const DEVICE_ADDRESS: &str = "24:6F:28:AA:BB:CC";

// ----------------------------------------------------------------------------
// Scripted Backend
// ----------------------------------------------------------------------------

/// What the fake radio will do
#[derive(Debug, Clone)]
pub struct Script {
    pub preflight: Result<(), BackendError>,
    pub scan_start: Result<(), BackendError>,
    pub advertisements: Vec<Advertisement>,
    pub connect: Result<(), BackendError>,
    pub gatt: DiscoveredGatt,
    /// Drop the link before the connect call returns
    pub lose_link_during_connect: bool,
    /// Drop the link while discovery is in flight
    pub lose_link_during_discovery: bool,
    /// Reject the write of this chunk index
    pub fail_write_at: Option<usize>,
    /// Drop the link after this many acknowledged writes
    pub lose_link_after_writes: Option<usize>,
    /// How long each write waits for its acknowledgement
    pub write_delay: Option<Duration>,
    pub notifications: Vec<Vec<u8>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            preflight: Ok(()),
            scan_start: Ok(()),
            advertisements: vec![target_advertisement()],
            connect: Ok(()),
            gatt: complete_gatt(),
            lose_link_during_connect: false,
            lose_link_during_discovery: false,
            fail_write_at: None,
            lose_link_after_writes: None,
            write_delay: None,
            notifications: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Calls {
    start_scan: usize,
    stop_scan: usize,
    connect: Vec<String>,
    disconnect: Vec<String>,
    write_attempts: usize,
    writes: Vec<Vec<u8>>,
    writes_in_flight: usize,
    peak_writes_in_flight: usize,
    link_senders: Vec<mpsc::UnboundedSender<LinkEvent>>,
}

pub struct FakeCentral {
    script: Script,
    calls: Mutex<Calls>,
}

impl FakeCentral {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Simulate the peripheral dropping the link
    pub fn drop_link(&self, address: &str) {
        let calls = self.calls.lock().unwrap();
        for sender in &calls.link_senders {
            let _ = sender.unbounded_send(LinkEvent::Disconnected {
                address: address.to_string(),
            });
        }
    }

    pub fn start_scan_calls(&self) -> usize {
        self.calls.lock().unwrap().start_scan
    }

    pub fn stop_scan_calls(&self) -> usize {
        self.calls.lock().unwrap().stop_scan
    }

    pub fn connect_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().connect.clone()
    }

    pub fn disconnect_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().disconnect.clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.calls.lock().unwrap().write_attempts
    }

    /// Most writes that were awaiting acknowledgement at the same time
    pub fn peak_writes_in_flight(&self) -> usize {
        self.calls.lock().unwrap().peak_writes_in_flight
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().writes.clone()
    }

    pub fn envelopes(&self) -> Vec<ChunkEnvelope> {
        self.writes()
            .iter()
            .map(|bytes| ChunkEnvelope::decode(bytes).unwrap())
            .collect()
    }
}

#[async_trait]
impl CentralBackend for FakeCentral {
    async fn preflight(&self) -> Result<(), BackendError> {
        self.script.preflight.clone()
    }

    async fn start_scan(&self) -> Result<AdvertisementStream, BackendError> {
        self.calls.lock().unwrap().start_scan += 1;
        self.script.scan_start.clone()?;

        // A real scan keeps running until stopped
        Ok(stream::iter(self.script.advertisements.clone())
            .chain(stream::pending())
            .boxed())
    }

    async fn stop_scan(&self) -> Result<(), BackendError> {
        self.calls.lock().unwrap().stop_scan += 1;
        Ok(())
    }

    async fn link_events(&self) -> Result<LinkEventStream, BackendError> {
        let (tx, rx) = mpsc::unbounded();
        self.calls.lock().unwrap().link_senders.push(tx);
        Ok(rx.boxed())
    }

    async fn connect(&self, address: &str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().connect.push(address.to_string());
        if self.script.lose_link_during_connect {
            self.drop_link(address);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.script.connect.clone()
    }

    async fn discover(&self, address: &str) -> Result<DiscoveredGatt, BackendError> {
        if self.script.lose_link_during_discovery {
            self.drop_link(address);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(self.script.gatt.clone())
    }

    async fn enable_notifications(
        &self,
        _handle: &CharacteristicHandle,
    ) -> Result<NotificationStream, BackendError> {
        Ok(stream::iter(self.script.notifications.clone())
            .chain(stream::pending())
            .boxed())
    }

    async fn write(&self, handle: &CharacteristicHandle, data: &[u8]) -> Result<(), BackendError> {
        assert_eq!(handle.uuid, CHARACTERISTIC_UUID);

        {
            let mut calls = self.calls.lock().unwrap();
            calls.writes_in_flight += 1;
            calls.peak_writes_in_flight = calls.peak_writes_in_flight.max(calls.writes_in_flight);
        }
        if let Some(delay) = self.script.write_delay {
            tokio::time::sleep(delay).await;
        }

        let lose_link = {
            let mut calls = self.calls.lock().unwrap();
            calls.writes_in_flight -= 1;
            let index = calls.write_attempts;
            calls.write_attempts += 1;

            if self.script.fail_write_at == Some(index) {
                return Err(BackendError::Operation("write rejected".to_string()));
            }
            calls.writes.push(data.to_vec());
            self.script.lose_link_after_writes == Some(calls.writes.len())
        };

        if lose_link {
            self.drop_link(handle.address());
        }
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .disconnect
            .push(address.to_string());
        Ok(())
    }
}

pub fn target_advertisement() -> Advertisement {
    Advertisement::new(Some("ESP32_JSON_BLE".to_string()), DEVICE_ADDRESS)
}

pub fn complete_gatt() -> DiscoveredGatt {
    DiscoveredGatt {
        services: vec![DiscoveredService {
            uuid: SERVICE_UUID,
            characteristics: vec![CHARACTERISTIC_UUID],
        }],
    }
}

// ----------------------------------------------------------------------------
// Recording Sink
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<BridgeEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn count(&self, event: &BridgeEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::SendProgress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self, wanted: Severity) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::Alert { text, severity } if *severity == wanted => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::Log { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_events(&self) -> Vec<BridgeEvent> {
        self.events()
            .into_iter()
            .filter(BridgeEvent::is_terminal)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BridgeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ----------------------------------------------------------------------------
// Receiver Contract
// ----------------------------------------------------------------------------

/// Reassembles sessions the way the peripheral firmware does
#[derive(Default)]
pub struct Reassembler {
    sessions: BTreeMap<String, (usize, BTreeMap<usize, String>)>,
}

impl Reassembler {
    /// Feed one envelope; returns the payload once the session is complete
    pub fn accept(&mut self, envelope: ChunkEnvelope) -> Option<String> {
        let key = envelope.session_id.as_str().to_string();
        let entry = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| (envelope.total_chunks, BTreeMap::new()));
        entry.1.insert(envelope.chunk_index, envelope.data);

        if entry.1.len() == entry.0 {
            let (_, chunks) = self.sessions.remove(&key)?;
            return Some(chunks.into_values().collect());
        }
        None
    }
}

// ----------------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------------

pub fn bridge_with(script: Script) -> (Bridge<FakeCentral>, RecordingSink) {
    let sink = RecordingSink::default();
    let bridge = Bridge::new(
        FakeCentral::new(script),
        BridgeConfig::default(),
        Arc::new(sink.clone()),
    )
    .unwrap();
    (bridge, sink)
}

/// A bridge that already reached Ready, with the connect events cleared
pub async fn connected_bridge(script: Script) -> (Bridge<FakeCentral>, RecordingSink) {
    let (bridge, sink) = bridge_with(script);
    bridge.connect().await.unwrap();
    settle().await;
    sink.clear();
    (bridge, sink)
}

/// Let background tasks run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
