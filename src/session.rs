// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Ingestion sessions
//!
//! A session drains one connection frame by frame. Each frame is decoded,
//! validated, folded into the [`Monitor`]'s statistics and history, then
//! classified. Observers see every accepted and rejected reading.
//!
//! The session ends when the peer disconnects (including mid-frame or
//! mid-batch), on a transport error, or when the cancellation token fires.
//! None of these are errors for the process.

use crate::classifier::{Assessment, Classifier, Thresholds};
use crate::config::MonitorConfig;
use crate::error::{FrameError, ValidationError};
use crate::history::History;
use crate::metrics::Stats;
use crate::protocol::{FrameProtocol, Reading, SourceTag, FRAME_SIZE};
use crate::validation::{is_implausible, validate};
use std::io::{ErrorKind, Read};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pipeline state shared by every session of a process
#[derive(Debug, Clone)]
pub struct Monitor {
    classifier: Classifier,
    stats: Stats,
    history: History<Reading>,
}

impl Monitor {
    /// Create a monitor with the given thresholds and history capacity
    pub fn new(thresholds: Thresholds, history_capacity: usize) -> Self {
        Self {
            classifier: Classifier::with_thresholds(thresholds),
            stats: Stats::new(),
            history: History::new(history_capacity),
        }
    }

    /// Create a monitor from process configuration
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.thresholds, config.history_capacity)
    }

    /// Run one decoded reading through validation, aggregation and classification
    ///
    /// Rejected readings only bump the error counter.
    pub fn ingest(&mut self, reading: Reading) -> Result<Assessment, ValidationError> {
        if let Err(e) = validate(&reading) {
            self.stats.record_error();
            return Err(e);
        }
        self.stats.record_valid(&reading);
        self.history.push(reading);
        Ok(self.classifier.assess(&reading))
    }

    /// Running statistics
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Recent accepted readings
    pub fn history(&self) -> &History<Reading> {
        &self.history
    }

    /// Classifier in use
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Receives session events
///
/// All methods default to no-ops.
pub trait SessionObserver {
    /// A reading passed validation
    fn on_reading(
        &mut self,
        _tag: SourceTag,
        _reading: &Reading,
        _assessment: &Assessment,
        _monitor: &Monitor,
    ) {
    }

    /// A reading was rejected
    fn on_rejected(&mut self, _tag: SourceTag, _reading: &Reading, _error: &ValidationError) {}

    /// The session finished
    fn on_session_end(&mut self, _summary: &SessionSummary) {}
}

impl SessionObserver for () {}

impl<T: SessionObserver> SessionObserver for Option<T> {
    fn on_reading(
        &mut self,
        tag: SourceTag,
        reading: &Reading,
        assessment: &Assessment,
        monitor: &Monitor,
    ) {
        if let Some(inner) = self {
            inner.on_reading(tag, reading, assessment, monitor);
        }
    }

    fn on_rejected(&mut self, tag: SourceTag, reading: &Reading, error: &ValidationError) {
        if let Some(inner) = self {
            inner.on_rejected(tag, reading, error);
        }
    }

    fn on_session_end(&mut self, summary: &SessionSummary) {
        if let Some(inner) = self {
            inner.on_session_end(summary);
        }
    }
}

impl<A: SessionObserver, B: SessionObserver> SessionObserver for (A, B) {
    fn on_reading(
        &mut self,
        tag: SourceTag,
        reading: &Reading,
        assessment: &Assessment,
        monitor: &Monitor,
    ) {
        self.0.on_reading(tag, reading, assessment, monitor);
        self.1.on_reading(tag, reading, assessment, monitor);
    }

    fn on_rejected(&mut self, tag: SourceTag, reading: &Reading, error: &ValidationError) {
        self.0.on_rejected(tag, reading, error);
        self.1.on_rejected(tag, reading, error);
    }

    fn on_session_end(&mut self, summary: &SessionSummary) {
        self.0.on_session_end(summary);
        self.1.on_session_end(summary);
    }
}

/// Reads whole frames from a byte stream
///
/// Partial reads are accumulated. When the stream has a read timeout, each
/// timeout is a chance to observe cancellation; a quiet peer is otherwise
/// waited on indefinitely.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a stream
    pub fn new(inner: R, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    /// Read exactly one frame
    pub fn read_frame(&mut self) -> Result<[u8; FRAME_SIZE], FrameError> {
        let mut frame = [0u8; FRAME_SIZE];
        let mut filled = 0;

        while filled < FRAME_SIZE {
            if self.cancel.is_cancelled() {
                return Err(FrameError::Cancelled);
            }
            match self.inner.read(&mut frame[filled..]) {
                Ok(0) => return Err(FrameError::Incomplete { received: filled }),
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(FrameError::Io(e.to_string())),
            }
        }

        Ok(frame)
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionEnd {
    /// Peer closed the connection on a frame boundary
    #[default]
    Disconnected,
    /// Peer closed the connection part-way through a frame or batch
    Truncated {
        /// Bytes of the partial frame that were discarded
        partial_bytes: usize,
        /// Frames of the current batch that never arrived
        missing_frames: usize,
    },
    /// Shutdown was requested
    Cancelled,
    /// Transport failure
    Failed(String),
}

/// What a session did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSummary {
    /// Complete frames received
    pub frames: u64,
    /// Readings that passed validation
    pub accepted: u64,
    /// Readings rejected by validation
    pub rejected: u64,
    /// Rejected readings with no plausible field at all
    pub malformed: u64,
    /// How the session ended
    pub end: SessionEnd,
}

/// One connection's worth of ingestion
pub struct IngestionSession<'m, R> {
    reader: FrameReader<R>,
    protocol: FrameProtocol,
    monitor: &'m mut Monitor,
    peer: String,
}

impl<'m, R: Read> IngestionSession<'m, R> {
    /// Create a session over a byte stream
    pub fn new(
        stream: R,
        protocol: FrameProtocol,
        monitor: &'m mut Monitor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reader: FrameReader::new(stream, cancel),
            protocol,
            monitor,
            peer: "client".to_string(),
        }
    }

    /// Name the peer in log messages
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Drain the stream until it ends
    pub fn run(mut self, observer: &mut dyn SessionObserver) -> SessionSummary {
        let group = self.protocol.frames_per_group();
        let mut summary = SessionSummary::default();

        summary.end = 'session: loop {
            for index in 0..group {
                let frame = match self.reader.read_frame() {
                    Ok(frame) => frame,
                    Err(e) => break 'session self.end_reason(e, group - index, index > 0),
                };
                summary.frames += 1;

                let tag = self.protocol.tag(index);
                self.process(tag, Reading::decode(&frame), &mut summary, observer);
            }
        };

        observer.on_session_end(&summary);
        summary
    }

    fn process(
        &mut self,
        tag: SourceTag,
        reading: Reading,
        summary: &mut SessionSummary,
        observer: &mut dyn SessionObserver,
    ) {
        match self.monitor.ingest(reading) {
            Ok(assessment) => {
                summary.accepted += 1;
                info!(
                    "Data received from {} - V: {}V, I: {}A, T: {}°C",
                    tag, reading.pack_voltage, reading.pack_current, reading.cell_temp
                );
                if let Some(message) = assessment.message() {
                    warn!("{}", message);
                }
                observer.on_reading(tag, &reading, &assessment, self.monitor);
            }
            Err(e) => {
                summary.rejected += 1;
                if is_implausible(&reading) {
                    summary.malformed += 1;
                    error!("Invalid data received from {}: {}", tag, FrameError::Malformed);
                } else {
                    error!("Invalid data received from {}: {}", tag, e);
                }
                observer.on_rejected(tag, &reading, &e);
            }
        }
    }

    fn end_reason(&self, error: FrameError, remaining: usize, mid_batch: bool) -> SessionEnd {
        match error {
            FrameError::Incomplete { received } if received == 0 && !mid_batch => {
                info!("Client {} disconnected", self.peer);
                SessionEnd::Disconnected
            }
            FrameError::Incomplete { received } => {
                let missing_frames = if mid_batch { remaining } else { 0 };
                warn!(
                    "Client {} disconnected mid-transfer, discarding {} bytes and {} pending frames",
                    self.peer, received, missing_frames
                );
                SessionEnd::Truncated {
                    partial_bytes: received,
                    missing_frames,
                }
            }
            FrameError::Cancelled => {
                info!("Session with {} cancelled", self.peer);
                SessionEnd::Cancelled
            }
            FrameError::Io(reason) => {
                error!("Error reading from {}: {}", self.peer, reason);
                SessionEnd::Failed(reason)
            }
            FrameError::Malformed => SessionEnd::Failed(FrameError::Malformed.to_string()),
        }
    }
}
