//! Caller-facing facade: `connect`, `send`, `is_connected`
//!
//! The bridge owns the connection machine and drives a [`CentralBackend`]
//! through scan, connect and discovery. Unsolicited platform callbacks (link
//! loss, notifications) are consumed on their own tasks and feed the same
//! machine, so every state change goes through one lock.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::backend::{CentralBackend, LinkEvent};
use crate::config::BridgeConfig;
use crate::error::{ConfigError, ConnectError, TransferError};
use crate::events::{BridgeEvent, EventSink, Severity};
use crate::filter::{Advertisement, DeviceFilter, ScanVerdict};
use crate::protocol::{PeripheralReply, CHARACTERISTIC_UUID, SERVICE_UUID};
use crate::state::{CharacteristicHandle, ConnectionEvent, ConnectionMachine, ConnectionState};
use crate::transfer::{ChunkedTransfer, TransferReport};

// ----------------------------------------------------------------------------
// Link Resources
// ----------------------------------------------------------------------------

/// Everything that has to be released when the link goes away
#[derive(Default)]
struct LinkResources {
    address: Option<String>,
    watcher: Option<JoinHandle<()>>,
    notifications: Option<JoinHandle<()>>,
}

impl LinkResources {
    fn abort_tasks(&mut self) {
        if let Some(task) = self.watcher.take() {
            task.abort();
        }
        if let Some(task) = self.notifications.take() {
            task.abort();
        }
    }
}

struct Inner<B> {
    backend: B,
    machine: ConnectionMachine,
    sink: Arc<dyn EventSink>,
    config: BridgeConfig,
    filter: DeviceFilter,
    link: Mutex<LinkResources>,
    connect_lock: Mutex<()>,
    // One session owns the characteristic at a time
    send_lock: Mutex<()>,
}

// ----------------------------------------------------------------------------
// Bridge
// ----------------------------------------------------------------------------

/// Connection to the single target peripheral
pub struct Bridge<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for Bridge<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CentralBackend> Bridge<B> {
    /// Create a bridge over `backend`, reporting to `sink`
    pub fn new(
        backend: B,
        config: BridgeConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                machine: ConnectionMachine::new(Arc::clone(&sink)),
                filter: DeviceFilter::from_config(&config),
                sink,
                config,
                link: Mutex::new(LinkResources::default()),
                connect_lock: Mutex::new(()),
                send_lock: Mutex::new(()),
            }),
        })
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Whether a transfer may start right now
    pub async fn is_connected(&self) -> bool {
        self.inner.machine.is_ready().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.machine.snapshot().await
    }

    // ------------------------------------------------------------------------
    // Connect
    // ------------------------------------------------------------------------

    /// Scan for the peripheral, connect and discover its characteristic.
    ///
    /// Emits exactly one of `ConnectSucceeded` / `ConnectFailed`, except for
    /// [`ConnectError::InProgress`] which leaves the running attempt alone.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let _guard = match self.inner.connect_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("connect requested while another attempt is running");
                self.emit(BridgeEvent::log("Connection attempt already in progress"));
                return Err(ConnectError::InProgress);
            }
        };

        info!("starting connection to peripheral");
        self.emit(BridgeEvent::log("Starting connection to peripheral"));

        if self.inner.machine.is_ready().await {
            self.emit(BridgeEvent::log("Closing existing connection"));
            self.close_link().await;
            self.apply(ConnectionEvent::Teardown).await;
        } else {
            self.close_link().await;
        }

        match self.establish().await {
            Ok(handle) => {
                info!(address = handle.address(), "peripheral ready");
                self.emit(BridgeEvent::log("Characteristic found"));
                self.emit(BridgeEvent::alert(
                    "Connected to peripheral",
                    Severity::Success,
                ));
                self.emit(BridgeEvent::ConnectSucceeded);

                let task = self.spawn_notifications(handle);
                self.inner.link.lock().await.notifications = Some(task);
                Ok(())
            }
            Err(err) => {
                warn!("connect failed: {}", err);
                self.close_link().await;
                self.emit(BridgeEvent::alert(err.to_string(), Severity::Error));
                self.emit(BridgeEvent::ConnectFailed);
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<CharacteristicHandle, ConnectError> {
        let inner = &self.inner;

        if let Err(e) = inner.backend.preflight().await {
            warn!("preflight check failed: {}", e);
            let reason = e.into_scan_error();
            return Err(self.fail_with(ConnectionEvent::PreflightFailed(reason)).await);
        }

        self.advance(ConnectionEvent::StartScan).await?;
        self.start_link_watcher().await;

        let advertisement = self.scan().await?;
        let address = advertisement.address.clone();

        self.advance(ConnectionEvent::DeviceMatched {
            address: address.clone(),
        })
        .await?;
        inner.link.lock().await.address = Some(address.clone());

        self.emit(BridgeEvent::log(format!(
            "Connecting to {} ({})",
            advertisement.display_name(),
            address
        )));
        match timeout(inner.config.connect_timeout, inner.backend.connect(&address)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(self.fail_with(ConnectionEvent::LinkFailed(e.to_string())).await);
            }
            Err(_) => {
                let reason = "connection timed out".to_string();
                return Err(self.fail_with(ConnectionEvent::LinkFailed(reason)).await);
            }
        }

        self.advance(ConnectionEvent::LinkEstablished).await?;
        self.emit(BridgeEvent::log("GATT link established"));

        sleep(inner.config.discovery_delay).await;

        let gatt = match inner.backend.discover(&address).await {
            Ok(gatt) => gatt,
            Err(e) => {
                let reason = format!("service discovery failed: {}", e);
                return Err(self.fail_with(ConnectionEvent::LinkFailed(reason)).await);
            }
        };
        debug!(services = gatt.services.len(), "services discovered");

        let handle = match gatt.resolve(&address, SERVICE_UUID, CHARACTERISTIC_UUID) {
            Ok(handle) => handle,
            Err(ConnectError::ServiceNotFound) => {
                return Err(self.fail_with(ConnectionEvent::ServiceMissing).await);
            }
            Err(_) => {
                return Err(self.fail_with(ConnectionEvent::CharacteristicMissing).await);
            }
        };

        self.advance(ConnectionEvent::ServicesResolved(handle.clone()))
            .await?;
        Ok(handle)
    }

    async fn scan(&self) -> Result<Advertisement, ConnectError> {
        let inner = &self.inner;

        let mut advertisements = match inner.backend.start_scan().await {
            Ok(stream) => stream,
            Err(e) => {
                return Err(self.fail_with(ConnectionEvent::ScanFailed(e.to_string())).await);
            }
        };
        info!("scanning for peripheral");
        self.emit(BridgeEvent::log("Scanning for peripheral"));

        let search = async {
            while let Some(advertisement) = advertisements.next().await {
                match inner.filter.evaluate(&advertisement) {
                    ScanVerdict::Matched => return Some(advertisement),
                    ScanVerdict::Unnamed => {
                        debug!(address = %advertisement.address, "unnamed device");
                        self.emit(BridgeEvent::log(format!(
                            "Unnamed device found: {}",
                            advertisement.address
                        )));
                    }
                    ScanVerdict::Ignored => {
                        debug!(
                            name = advertisement.display_name(),
                            address = %advertisement.address,
                            "device found"
                        );
                        self.emit(BridgeEvent::log(format!(
                            "Device found: {} ({})",
                            advertisement.display_name(),
                            advertisement.address
                        )));
                    }
                }
            }
            None
        };

        let outcome = timeout(inner.config.scan_timeout, search).await;
        self.stop_scan().await;

        match outcome {
            Ok(Some(advertisement)) => {
                info!(
                    name = advertisement.display_name(),
                    address = %advertisement.address,
                    "peripheral found"
                );
                self.emit(BridgeEvent::log(format!(
                    "Peripheral found: {}",
                    advertisement.display_name()
                )));
                Ok(advertisement)
            }
            Ok(None) => {
                let reason = "scan ended before the peripheral was found".to_string();
                Err(self.fail_with(ConnectionEvent::ScanFailed(reason)).await)
            }
            Err(_) => Err(self.fail_with(ConnectionEvent::ScanTimedOut).await),
        }
    }

    // ------------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------------

    /// Transfer `payload` as a chunked session. Requires the Ready state.
    ///
    /// Sessions never interleave: a second `send` waits until the running
    /// one has finished.
    pub async fn send(&self, payload: &str) -> Result<TransferReport, TransferError> {
        let _session = self.inner.send_lock.lock().await;
        ChunkedTransfer::new(
            &self.inner.backend,
            &self.inner.machine,
            self.inner.sink.as_ref(),
            &self.inner.config,
        )
        .run(payload)
        .await
    }

    /// Run [`Bridge::send`] on a dedicated task
    pub fn spawn_send(&self, payload: String) -> JoinHandle<Result<TransferReport, TransferError>> {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.send(&payload).await })
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Stop scanning, release the link and return to Idle. Idempotent.
    pub async fn shutdown(&self) {
        self.stop_scan().await;
        self.close_link().await;
        self.apply(ConnectionEvent::Teardown).await;
        info!("bridge shut down");
    }

    async fn stop_scan(&self) {
        // Cleanup path: an already stopped scan is fine.
        if let Err(e) = self.inner.backend.stop_scan().await {
            debug!("stop scan: {}", e);
        }
    }

    async fn close_link(&self) {
        let mut link = self.inner.link.lock().await;
        link.abort_tasks();
        if let Some(address) = link.address.take() {
            if let Err(e) = self.inner.backend.disconnect(&address).await {
                debug!(address = %address, "disconnect: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Background Tasks
    // ------------------------------------------------------------------------

    async fn start_link_watcher(&self) {
        let mut events = match self.inner.backend.link_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("link events unavailable: {}", e);
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(LinkEvent::Disconnected { address }) = events.next().await {
                let applied = inner
                    .machine
                    .apply_if(
                        |state| state.address() == Some(address.as_str()),
                        ConnectionEvent::LinkLost,
                    )
                    .await;

                let Ok(Some((previous, _))) = applied else {
                    continue;
                };

                if previous.is_ready() {
                    warn!(address = %address, "link lost while ready");
                    inner.sink.emit(BridgeEvent::log("GATT link lost"));
                    inner.sink.emit(BridgeEvent::alert(
                        "Connection to the peripheral was lost",
                        Severity::Error,
                    ));
                    inner.sink.emit(BridgeEvent::ConnectFailed);

                    {
                        let mut link = inner.link.lock().await;
                        if let Some(task) = link.notifications.take() {
                            task.abort();
                        }
                        // This task is the watcher; it exits below.
                        link.watcher.take();
                        link.address = None;
                    }
                    if let Err(e) = inner.backend.disconnect(&address).await {
                        debug!(address = %address, "disconnect: {}", e);
                    }
                } else {
                    debug!(address = %address, from = previous.state_name(), "link lost during connect");
                }
                break;
            }
        });

        self.inner.link.lock().await.watcher = Some(task);
    }

    fn spawn_notifications(&self, handle: CharacteristicHandle) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut replies = match inner.backend.enable_notifications(&handle).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("enabling notifications failed: {}", e);
                    inner.sink.emit(BridgeEvent::log(format!(
                        "Could not enable notifications: {}",
                        e
                    )));
                    return;
                }
            };

            if let Err(e) = inner.machine.apply(ConnectionEvent::NotificationsEnabled).await {
                debug!("notifications enabled after leaving ready: {}", e);
                return;
            }
            inner.sink.emit(BridgeEvent::log("Notifications enabled"));

            while let Some(raw) = replies.next().await {
                let reply = PeripheralReply::parse(&raw);
                info!(reply = ?reply, "peripheral reply");
                inner.sink.emit(BridgeEvent::log(format!(
                    "Peripheral reply: {}",
                    String::from_utf8_lossy(&raw)
                )));

                let severity = if reply.is_error() {
                    Severity::Error
                } else {
                    Severity::Success
                };
                inner.sink.emit(BridgeEvent::alert(reply.to_string(), severity));
            }
            debug!("notification stream ended");
        })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn emit(&self, event: BridgeEvent) {
        self.inner.sink.emit(event);
    }

    async fn apply(&self, event: ConnectionEvent) {
        if let Err(e) = self.inner.machine.apply(event).await {
            debug!("{}", e);
        }
    }

    /// Apply a happy-path step; if a concurrent event already moved the
    /// machine elsewhere, report why the attempt cannot continue.
    async fn advance(&self, event: ConnectionEvent) -> Result<(), ConnectError> {
        match self.inner.machine.apply(event).await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("connect sequence interrupted: {}", e);
                Err(self.current_failure().await)
            }
        }
    }

    /// Apply a failure event and return the resulting reason
    async fn fail_with(&self, event: ConnectionEvent) -> ConnectError {
        self.apply(event).await;
        self.current_failure().await
    }

    async fn current_failure(&self) -> ConnectError {
        match self.inner.machine.snapshot().await {
            ConnectionState::Failed(reason) => reason,
            // Only a shutdown moves the machine to Idle mid-attempt
            ConnectionState::Idle => ConnectError::Cancelled,
            _ => ConnectError::SpontaneousDisconnect,
        }
    }
}
