// Packwatch Testdata - Synthetic battery telemetry
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Packwatch Testdata
//!
//! Synthetic battery telemetry for exercising a Packwatch monitor.
//!
//! - **Scenarios**: normal, charging, discharging, overheating,
//!   voltage anomaly and random readings
//! - **Degradation series**: extended readings of an ageing pack, for the
//!   prediction engine
//! - **Test client**: streams scenario frames to a monitor over TCP
//!
//! ## Quick Start
//!
//! ```rust
//! use packwatch_testdata::{Scenario, ScenarioGenerator};
//!
//! let mut generator = ScenarioGenerator::with_seed(Scenario::Overheating, 42);
//! let readings = generator.series(31, 1.0);
//!
//! assert!(readings[30].cell_temp > 60.0);
//! ```
//!
//! ## Streaming to a monitor
//!
//! ```rust,no_run
//! use packwatch::FrameProtocol;
//! use packwatch_testdata::{Scenario, ScenarioGenerator, StreamPlan, TestClient};
//!
//! let addr = "127.0.0.1:23456".parse().unwrap();
//! let mut client = TestClient::connect(addr, FrameProtocol::SingleReading).unwrap();
//! let mut generator = ScenarioGenerator::new(Scenario::Charging);
//! client
//!     .stream(&mut generator, &StreamPlan::default(), |_| {})
//!     .unwrap();
//! ```

pub mod client;
pub mod degradation;
pub mod scenario;

// Re-exports for convenience
pub use client::{ClientError, StreamPlan, TestClient};
pub use degradation::DegradationSeries;
pub use scenario::{Scenario, ScenarioGenerator};
