//! Command handlers for the gattpipe CLI

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{interval, timeout};
use tracing::{info, warn};

use gattpipe_ble::BtleplugCentral;
use gattpipe_core::{
    Bridge, CentralBackend, ChannelSink, DeviceFilter, FanoutSink, ScanVerdict, TracingSink,
};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::ConsoleRenderer;

/// How often `connect` checks whether the link is still up
const LINK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Scan { seconds } => {
                Self::handle_scan_command(&config, Duration::from_secs(seconds)).await
            }
            Commands::Connect => Self::handle_connect_command(config, cli.verbose).await,
            Commands::Send { file, json, strict } => {
                let payload = match (file, json) {
                    (Some(path), _) => tokio::fs::read_to_string(path).await?,
                    (None, Some(json)) => json,
                    (None, None) => return Err(CliError::NoPayload),
                };
                Self::handle_send_command(config, cli.verbose, payload, strict).await
            }
            Commands::Config => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }

    /// List advertisements and how the peripheral filter classifies them
    async fn handle_scan_command(config: &AppConfig, duration: Duration) -> Result<()> {
        let central = BtleplugCentral::new(config.ble.clone()).await?;
        let filter = DeviceFilter::from_config(&config.bridge);

        central.preflight().await?;
        let mut advertisements = central.start_scan().await?;
        info!("Scanning for {} seconds", duration.as_secs());

        let listing = async {
            let mut seen = HashSet::new();
            while let Some(advertisement) = advertisements.next().await {
                if !seen.insert(advertisement.address.clone()) {
                    continue;
                }
                let marker = match filter.evaluate(&advertisement) {
                    ScanVerdict::Matched => "*",
                    ScanVerdict::Ignored => " ",
                    ScanVerdict::Unnamed => "?",
                };
                println!(
                    "{} {}  {}",
                    marker,
                    advertisement.address,
                    advertisement.display_name()
                );
            }
        };
        // Scans run until stopped, so the timeout is the normal way out.
        let _ = timeout(duration, listing).await;

        central.stop_scan().await?;
        Ok(())
    }

    /// Hold a connection open until interrupted or the link drops
    async fn handle_connect_command(config: AppConfig, verbose: bool) -> Result<()> {
        let (bridge, printer) = Self::open_bridge(&config, verbose).await?;

        if let Err(e) = bridge.connect().await {
            Self::finish(bridge, printer).await;
            return Err(e.into());
        }

        let mut poll = interval(LINK_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, disconnecting");
                    break;
                }
                _ = poll.tick() => {
                    if !bridge.is_connected().await {
                        warn!("Link to the peripheral is gone");
                        break;
                    }
                }
            }
        }

        bridge.shutdown().await;
        Self::finish(bridge, printer).await;
        Ok(())
    }

    /// Connect, transfer `payload` and disconnect
    async fn handle_send_command(
        config: AppConfig,
        verbose: bool,
        payload: String,
        strict: bool,
    ) -> Result<()> {
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&payload) {
            if strict {
                return Err(CliError::InvalidPayload(e));
            }
            warn!("Payload is not valid JSON, sending anyway: {}", e);
        }

        let (bridge, printer) = Self::open_bridge(&config, verbose).await?;

        if let Err(e) = bridge.connect().await {
            Self::finish(bridge, printer).await;
            return Err(e.into());
        }
        let result = bridge.send(&payload).await;

        bridge.shutdown().await;
        Self::finish(bridge, printer).await;

        let report = result?;
        info!(
            "Sent {} bytes in {} chunks (session {})",
            report.bytes_written, report.total_chunks, report.session_id
        );
        Ok(())
    }

    async fn open_bridge(
        config: &AppConfig,
        verbose: bool,
    ) -> Result<(Bridge<BtleplugCentral>, tokio::task::JoinHandle<()>)> {
        let central = BtleplugCentral::new(config.ble.clone()).await?;

        let (console, events) = ChannelSink::channel();
        let printer = ConsoleRenderer::new(&config.cli).spawn(events);

        // Verbose runs also keep the event stream in the tracing log
        let mut sink = FanoutSink::new().with_sink(Arc::new(console));
        if verbose {
            sink = sink.with_sink(Arc::new(TracingSink));
        }

        let bridge = Bridge::new(central, config.bridge.clone(), Arc::new(sink))?;
        Ok((bridge, printer))
    }

    /// Drop the bridge so the printer drains and exits
    async fn finish(bridge: Bridge<BtleplugCentral>, printer: tokio::task::JoinHandle<()>) {
        drop(bridge);
        if timeout(Duration::from_secs(1), printer).await.is_err() {
            warn!("Event printer did not drain in time");
        }
    }
}
