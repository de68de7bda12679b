// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for Packwatch
//!
//! Everything here is plain data loaded once at startup and passed by
//! reference into the pipeline stages. Missing keys fall back to defaults.

use crate::classifier::Thresholds;
use crate::error::ConfigError;
use crate::history::RAW_HISTORY_CAPACITY;
use crate::protocol::FrameProtocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Default listening port
pub const DEFAULT_PORT: u16 = 23456;

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "battery_monitor.log";

/// Nameplate data of the monitored pack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatterySpecs {
    /// Rated capacity (Ah)
    pub nominal_capacity_ah: f64,
    /// Rated pack voltage (V)
    pub nominal_voltage: f64,
    /// Rated cycle life
    pub max_cycles: u32,
    /// Maximum cell temperature (°C)
    pub max_temp: f64,
    /// Minimum cell temperature (°C)
    pub min_temp: f64,
    /// Maximum pack current (A)
    pub max_current: f64,
}

impl Default for BatterySpecs {
    fn default() -> Self {
        Self {
            nominal_capacity_ah: 100.0,
            nominal_voltage: 355.2,
            max_cycles: 1000,
            max_temp: 60.0,
            min_temp: -20.0,
            max_current: 500.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecsDocument {
    Wrapped { battery_specifications: BatterySpecs },
    Flat(BatterySpecs),
}

impl BatterySpecs {
    /// Parse specs from JSON, flat or under a `battery_specifications` key
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let document: SpecsDocument =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(match document {
            SpecsDocument::Wrapped {
                battery_specifications,
            } => battery_specifications,
            SpecsDocument::Flat(specs) => specs,
        })
    }

    /// Load specs from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = read_file(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Load specs from a JSON file, falling back to defaults
    ///
    /// A missing file is expected and logged at info level; an unreadable or
    /// invalid file is logged as an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "Battery specs file {} not found, using defaults",
                path.display()
            );
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(specs) => {
                info!("Battery specifications loaded from {}", path.display());
                specs
            }
            Err(e) => {
                error!("Error loading battery specs: {}", e);
                Self::default()
            }
        }
    }
}

fn default_sink_path() -> String {
    "/api/battery-data".to_string()
}

fn default_sink_timeout() -> u64 {
    10
}

fn default_sink_source() -> String {
    "packwatch".to_string()
}

/// Where accepted readings are forwarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Backend base URL, e.g. `http://localhost:8000`
    pub url: String,
    /// Ingestion path appended to `url`
    #[serde(default = "default_sink_path")]
    pub path: String,
    /// Request timeout in seconds
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
    /// Source name reported with each reading
    #[serde(default = "default_sink_source")]
    pub source: String,
}

impl SinkConfig {
    /// Sink config with default path, timeout and source
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: default_sink_path(),
            timeout_secs: default_sink_timeout(),
            source: default_sink_source(),
        }
    }

    /// Full ingestion endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Monitor process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// TCP port to listen on
    pub port: u16,
    /// Frame grouping on each connection
    pub protocol: FrameProtocol,
    /// Raw history capacity
    pub history_capacity: usize,
    /// Socket poll interval in milliseconds, bounds shutdown latency
    pub poll_interval_ms: u64,
    /// Alert thresholds
    pub thresholds: Thresholds,
    /// Optional telemetry forwarding
    pub sink: Option<SinkConfig>,
    /// Log file path
    pub log_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            protocol: FrameProtocol::SingleReading,
            history_capacity: RAW_HISTORY_CAPACITY,
            poll_interval_ms: 250,
            thresholds: Thresholds::default(),
            sink: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl MonitorConfig {
    /// Parse a monitor config from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a monitor config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = read_file(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Socket poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
