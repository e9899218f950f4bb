//! Chunked transfer over the ready characteristic
//!
//! Writes are strictly one at a time: each envelope is written and its
//! acknowledgment awaited before the next one is built. The connection state
//! is re-read before every write so a concurrent disconnect aborts the loop.
//!
//! Success means every local write was acknowledged. The peripheral's own
//! reassembly result is not awaited; a fragment dropped after acknowledgment
//! goes unnoticed here.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::CentralBackend;
use crate::chunker::{ChunkPlan, SessionId};
use crate::config::BridgeConfig;
use crate::error::TransferError;
use crate::events::{BridgeEvent, EventSink, Severity};
use crate::state::ConnectionMachine;

/// Summary of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub session_id: SessionId,
    pub total_chunks: usize,
    pub bytes_written: usize,
}

/// Drives one `send` to completion or the first failure
pub struct ChunkedTransfer<'a, B: ?Sized> {
    backend: &'a B,
    machine: &'a ConnectionMachine,
    sink: &'a dyn EventSink,
    config: &'a BridgeConfig,
}

impl<'a, B: CentralBackend + ?Sized> ChunkedTransfer<'a, B> {
    pub fn new(
        backend: &'a B,
        machine: &'a ConnectionMachine,
        sink: &'a dyn EventSink,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            backend,
            machine,
            sink,
            config,
        }
    }

    /// Send `payload`, reporting exactly one terminal event
    pub async fn run(&self, payload: &str) -> Result<TransferReport, TransferError> {
        let result = self.write_all(payload).await;

        match &result {
            Ok(report) => {
                info!(
                    session = %report.session_id,
                    chunks = report.total_chunks,
                    "transfer complete"
                );
                self.sink.emit(BridgeEvent::log("All chunks sent"));
                self.sink.emit(BridgeEvent::alert(
                    format!("JSON sent in {} chunks", report.total_chunks),
                    Severity::Success,
                ));
                self.sink.emit(BridgeEvent::SendComplete);
            }
            Err(err) => {
                warn!("transfer failed: {}", err);
                self.sink
                    .emit(BridgeEvent::alert(err.to_string(), Severity::Error));
                self.sink.emit(BridgeEvent::SendFailed);
            }
        }

        result
    }

    async fn write_all(&self, payload: &str) -> Result<TransferReport, TransferError> {
        if !self.machine.is_ready().await {
            return Err(TransferError::NotConnected);
        }

        let plan = {
            let mut rng = rand::thread_rng();
            ChunkPlan::new(
                payload,
                self.config.fragment_size,
                self.config.session_id_len,
                &mut rng,
            )
        };
        let total = plan.total();

        info!(
            session = %plan.session_id(),
            chunks = total,
            chars = payload.chars().count(),
            "starting chunked transfer"
        );
        self.sink.emit(BridgeEvent::log(format!(
            "Payload split into {} chunks (session {})",
            total,
            plan.session_id()
        )));

        let mut bytes_written = 0;
        for envelope in plan.envelopes() {
            let index = envelope.chunk_index;

            let handle = self
                .machine
                .ready_handle()
                .await
                .ok_or(TransferError::NotConnected)?;

            let bytes = envelope
                .encode()
                .map_err(|e| TransferError::WriteFailed {
                    chunk_index: index,
                    reason: e.to_string(),
                })?;

            self.backend
                .write(&handle, &bytes)
                .await
                .map_err(|e| TransferError::WriteFailed {
                    chunk_index: index,
                    reason: e.to_string(),
                })?;
            bytes_written += bytes.len();

            debug!(index, total, len = bytes.len(), "chunk acknowledged");
            self.sink.emit(BridgeEvent::log(format!(
                "Chunk {}/{} sent",
                index + 1,
                total
            )));
            self.sink.emit(BridgeEvent::SendProgress {
                percent: plan.progress_after(index),
            });

            if !envelope.is_last() {
                sleep(self.config.chunk_pause).await;
            }
        }

        Ok(TransferReport {
            session_id: plan.session_id().clone(),
            total_chunks: total,
            bytes_written,
        })
    }
}
