// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Packwatch - Battery pack telemetry monitor
//!
//! Ingests fixed-size binary telemetry frames from battery packs over TCP,
//! validates them, keeps running statistics and a bounded history, raises
//! severity-graded alerts, and predicts remaining battery life.
//!
//! ## Pipeline
//!
//! ```text
//! frame (16 bytes) -> decode -> validate -> stats + history -> classify
//!                                   \-> error count
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use packwatch::{FrameProtocol, IngestionSession, Monitor, Reading, Severity};
//! use std::io::Cursor;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut monitor = Monitor::default();
//! let bytes: Vec<u8> = [
//!     Reading::new(0.0, 3.7, 1.2, 25.0),
//!     Reading::new(1.0, 2.4, 1.1, 25.5),
//! ]
//! .iter()
//! .flat_map(|r| r.encode())
//! .collect();
//!
//! let summary = IngestionSession::new(
//!     Cursor::new(bytes),
//!     FrameProtocol::SingleReading,
//!     &mut monitor,
//!     CancellationToken::new(),
//! )
//! .run(&mut ());
//!
//! assert_eq!(summary.accepted, 2);
//! assert_eq!(monitor.stats().valid_count, 2);
//! let latest = monitor.history().latest().unwrap();
//! assert_eq!(packwatch::classify(latest, &Default::default()), Severity::Critical);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Wire frame, readings, frame grouping
//! - [`validation`]: Physical plausibility checks
//! - [`metrics`]: Running statistics
//! - [`history`]: Bounded reading history
//! - [`classifier`]: Alert severity and messages
//! - [`prediction`]: Battery life prediction
//! - [`session`]: Per-connection ingestion
//! - [`server`]: TCP accept loop
//! - [`sink`]: Telemetry forwarding
//! - [`config`]: Specs and monitor configuration
//! - [`recovery`]: Retry and circuit breaker helpers

pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod prediction;
pub mod protocol;
pub mod recovery;
pub mod server;
pub mod session;
pub mod sink;
pub mod validation;

// Re-exports for convenient access
pub use classifier::{
    alert_message, classify, AlertCondition, Assessment, Classifier, FieldStatus, FieldStatuses,
    Severity, Thresholds,
};
pub use config::{BatterySpecs, MonitorConfig, SinkConfig};
pub use error::{
    ConfigError, FrameError, PackwatchError, PredictionError, Result, SinkError, ValidationError,
};
pub use history::History;
pub use metrics::Stats;
pub use prediction::{Prediction, PredictionEngine, PredictionLog, PredictionRecord};
pub use protocol::{ExtendedReading, FrameProtocol, Reading, SourceTag, FRAME_SIZE};
pub use recovery::{with_retry, CircuitBreaker, CircuitConfig, CircuitState, RetryStrategy};
pub use server::{Listener, ServeSummary};
pub use session::{
    FrameReader, IngestionSession, Monitor, SessionEnd, SessionObserver, SessionSummary,
};
pub use sink::{ForwardingObserver, TelemetryPayload, TelemetrySink};
#[cfg(feature = "http")]
pub use sink::HttpSink;
pub use validation::{validate, Field};
