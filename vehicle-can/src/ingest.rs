//! The ingestion loop
//!
//! A dedicated thread receives frames from a [`FrameTransport`] and hands
//! each one to the [`DecoderTable`], in receipt order, exactly once. It is the
//! only writer of [`VehicleSignals`].
//!
//! The loop runs until the process exits, the transport reports
//! [`TransportError::Closed`], or [`IngestionHandle::stop`] is called. A stop
//! request is noticed between receives, so a transport that blocks forever
//! should be given a read timeout.

use crate::config::IngestConfig;
use crate::decoder::DecoderTable;
use crate::signals::VehicleSignals;
use crate::transport::FrameTransport;
use crate::types::{CanFrame, Result, TransportError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Live counters kept by the ingestion loop
#[derive(Debug, Default)]
pub struct IngestStats {
    frames_received: AtomicU64,
    frames_decoded: AtomicU64,
    frames_ignored: AtomicU64,
    receive_errors: AtomicU64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestStatsSnapshot {
    pub frames_received: u64,
    /// Frames with a decoder in the table
    pub frames_decoded: u64,
    /// Frames with an unknown id
    pub frames_ignored: u64,
    pub receive_errors: u64,
}

/// Receives frames and dispatches them into the signal registry
pub struct Ingestion<T> {
    transport: T,
    table: Arc<DecoderTable>,
    signals: Arc<VehicleSignals>,
    config: IngestConfig,
    stats: Arc<IngestStats>,
    stop: Arc<AtomicBool>,
}

impl<T: FrameTransport> Ingestion<T> {
    pub fn new(transport: T, table: Arc<DecoderTable>, signals: Arc<VehicleSignals>) -> Self {
        Self {
            transport,
            table,
            signals,
            config: IngestConfig::default(),
            stats: Arc::new(IngestStats::default()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builder method: replace the loop settings
    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Decode one frame. Returns true if the table knew its id.
    pub fn process_frame(&self, frame: &CanFrame) -> bool {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);
        if self.table.dispatch(frame, &self.signals) {
            self.stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            log::trace!("Ignoring frame with unknown ID 0x{:03X}", frame.id);
            self.stats.frames_ignored.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Run the loop on the calling thread until the transport closes or a
    /// stop is requested
    pub fn run(&mut self) -> IngestStatsSnapshot {
        log::info!("Ingesting frames from {}", self.transport.name());

        while !self.stop.load(Ordering::Relaxed) {
            match self.transport.receive() {
                Ok(Some(frame)) => {
                    self.process_frame(&frame);
                }
                Ok(None) => {}
                Err(TransportError::Closed) => {
                    log::info!("{} closed", self.transport.name());
                    break;
                }
                Err(e) => {
                    self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Receive failed on {}: {}", self.transport.name(), e);
                    thread::sleep(self.config.error_backoff());
                }
            }
        }

        let stats = self.stats.snapshot();
        log::info!(
            "Ingestion stopped: {} frames received, {} decoded, {} ignored, {} errors",
            stats.frames_received,
            stats.frames_decoded,
            stats.frames_ignored,
            stats.receive_errors
        );
        stats
    }
}

impl<T: FrameTransport + 'static> Ingestion<T> {
    /// Start the loop on its own thread
    pub fn spawn(mut self) -> Result<IngestionHandle> {
        let stats = Arc::clone(&self.stats);
        let stop = Arc::clone(&self.stop);
        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || self.run())?;

        log::debug!("Ingestion thread started");
        Ok(IngestionHandle {
            thread,
            stats,
            stop,
        })
    }
}

/// Owner's handle on a running ingestion thread
pub struct IngestionHandle {
    thread: JoinHandle<IngestStatsSnapshot>,
    stats: Arc<IngestStats>,
    stop: Arc<AtomicBool>,
}

impl IngestionHandle {
    /// Ask the loop to stop after its current receive
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to end and return its final counters
    pub fn join(self) -> IngestStatsSnapshot {
        match self.thread.join() {
            Ok(stats) => stats,
            Err(_) => {
                log::error!("Ingestion thread panicked");
                self.stats.snapshot()
            }
        }
    }
}
