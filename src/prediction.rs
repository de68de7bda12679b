// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Battery life prediction
//!
//! The [`PredictionEngine`] keeps a bounded history of [`ExtendedReading`]s
//! and produces a [`Prediction`] from it through a [`PredictionStrategy`].
//! The analytical model is always available. An external generative
//! service can be enabled on top; any failure there falls back to the
//! analytical model, so [`PredictionEngine::predict_battery_life`] never
//! fails.
//!
//! ```rust
//! use packwatch::prediction::PredictionEngine;
//! use packwatch::{BatterySpecs, ExtendedReading, Reading};
//!
//! let mut engine = PredictionEngine::new(BatterySpecs::default());
//! for i in 0..12 {
//!     let reading = Reading::new(i as f32 * 3600.0, 355.0, 40.0, 25.0);
//!     engine.add_performance_data(ExtendedReading::new(reading).with_health(92.0));
//! }
//! let prediction = engine.predict_battery_life();
//! assert!(prediction.remaining_life_hours > 0.0);
//! ```

pub mod analytical;
pub mod external;

pub use analytical::AnalyticalStrategy;
pub use external::{ExternalStrategy, GenerativeBackend};

use crate::config::BatterySpecs;
use crate::error::PredictionError;
use crate::history::{History, EXTENDED_HISTORY_CAPACITY};
use crate::protocol::ExtendedReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Readings required before the engine attempts any prediction
pub const MIN_READINGS_FOR_PREDICTION: usize = 10;

/// Battery life estimate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Prediction {
    /// Hours until the remaining capacity is drained at the average draw
    pub remaining_life_hours: f64,
    /// Charge cycles left before rated cycle life
    pub remaining_cycles: f64,
    /// Health loss per cycle (%)
    pub degradation_rate: f64,
}

impl Prediction {
    /// All-zero prediction, returned when there is too little data
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether every figure is zero
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// Strategy that produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionSource {
    Analytical,
    External,
}

impl fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analytical => f.write_str("analytical"),
            Self::External => f.write_str("external"),
        }
    }
}

/// Strategy output before it is logged
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub prediction: Prediction,
    /// Confidence in the estimate (0.0 - 1.0)
    pub confidence: f64,
    /// Maintenance advice
    pub recommendations: Vec<String>,
}

impl Estimate {
    /// Estimate carrying only a prediction
    pub fn new(prediction: Prediction, confidence: f64) -> Self {
        Self {
            prediction,
            confidence,
            recommendations: Vec::new(),
        }
    }
}

/// A way of turning history into an estimate
pub trait PredictionStrategy: Send {
    /// Which strategy this is
    fn source(&self) -> PredictionSource;

    /// Produce an estimate from the history
    fn predict(
        &mut self,
        history: &History<ExtendedReading>,
        specs: &BatterySpecs,
    ) -> Result<Estimate, PredictionError>;
}

/// Averages over a history, shared by both strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub count: usize,
    pub avg_health: f64,
    pub avg_voltage: f64,
    pub avg_temp: f64,
    /// Mean of |current|
    pub avg_abs_current: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl HistorySummary {
    /// Summarize the whole history, `None` when it is empty
    pub fn from_history(history: &History<ExtendedReading>) -> Option<Self> {
        if history.is_empty() {
            return None;
        }

        let mut health = 0.0;
        let mut voltage = 0.0;
        let mut temp = 0.0;
        let mut current = 0.0;
        let mut min_temp = f64::INFINITY;
        let mut max_temp = f64::NEG_INFINITY;
        for entry in history {
            let t = f64::from(entry.reading.cell_temp);
            health += f64::from(entry.health_score);
            voltage += f64::from(entry.reading.pack_voltage);
            current += f64::from(entry.reading.pack_current.abs());
            temp += t;
            min_temp = min_temp.min(t);
            max_temp = max_temp.max(t);
        }

        let n = history.len() as f64;
        Some(Self {
            count: history.len(),
            avg_health: health / n,
            avg_voltage: voltage / n,
            avg_temp: temp / n,
            avg_abs_current: current / n,
            min_temp,
            max_temp,
        })
    }

    /// Spread between hottest and coldest reading
    pub fn temp_range(&self) -> f64 {
        self.max_temp - self.min_temp
    }
}

/// Maintenance advice for a summarized history
pub fn recommendations(summary: &HistorySummary) -> Vec<String> {
    let mut advice = Vec::new();

    if summary.avg_health < 80.0 {
        advice.push("Consider battery replacement soon".to_string());
    } else if summary.avg_health < 90.0 {
        advice.push("Monitor battery health closely".to_string());
    }

    if summary.avg_temp > 45.0 {
        advice.push("High temperature detected - check cooling system".to_string());
    } else if summary.avg_temp < 10.0 {
        advice.push("Low temperature - consider warming system".to_string());
    }

    advice
}

/// One entry of the prediction log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub prediction: Prediction,
    pub source: PredictionSource,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub produced_at: DateTime<Utc>,
}

/// Append-only log of every prediction produced
#[derive(Debug, Clone, Default)]
pub struct PredictionLog {
    records: Vec<PredictionRecord>,
}

impl PredictionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an estimate and return its prediction
    pub fn push(&mut self, estimate: Estimate, source: PredictionSource) -> Prediction {
        let prediction = estimate.prediction;
        self.records.push(PredictionRecord {
            prediction,
            source,
            confidence: estimate.confidence,
            recommendations: estimate.recommendations,
            produced_at: Utc::now(),
        });
        prediction
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&PredictionRecord> {
        self.records.last()
    }

    /// Records oldest first
    pub fn iter(&self) -> std::slice::Iter<'_, PredictionRecord> {
        self.records.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been predicted yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Generate a human-readable report of the latest prediction
    pub fn report(&self) -> String {
        let latest = match self.latest() {
            Some(latest) => latest,
            None => return "No predictions available.\n".to_string(),
        };

        let mut report = String::new();
        report.push_str("=== Battery Life Prediction Report ===\n");
        report.push_str(&format!(
            "Remaining Life: {:.1} hours\n",
            latest.prediction.remaining_life_hours
        ));
        report.push_str(&format!(
            "Remaining Cycles: {:.0} cycles\n",
            latest.prediction.remaining_cycles
        ));
        report.push_str(&format!(
            "Degradation Rate: {:.3}% per cycle\n",
            latest.prediction.degradation_rate
        ));
        report.push_str(&format!(
            "Model: {} (confidence {:.0}%)\n",
            latest.source,
            latest.confidence * 100.0
        ));
        if !latest.recommendations.is_empty() {
            report.push_str("Recommendations:\n");
            for advice in &latest.recommendations {
                report.push_str(&format!("  - {}\n", advice));
            }
        }
        report.push_str(&format!(
            "Generated: {}\n",
            latest.produced_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        report
    }
}

/// Owns the extended history and produces predictions from it
pub struct PredictionEngine {
    specs: BatterySpecs,
    history: History<ExtendedReading>,
    log: PredictionLog,
    analytical: AnalyticalStrategy,
    external: Option<Box<dyn PredictionStrategy>>,
}

impl PredictionEngine {
    /// Create an engine with the default history capacity
    pub fn new(specs: BatterySpecs) -> Self {
        Self::with_capacity(specs, EXTENDED_HISTORY_CAPACITY)
    }

    /// Create an engine keeping at most `capacity` readings
    pub fn with_capacity(specs: BatterySpecs, capacity: usize) -> Self {
        Self {
            specs,
            history: History::new(capacity),
            log: PredictionLog::new(),
            analytical: AnalyticalStrategy::new(),
            external: None,
        }
    }

    /// Record a reading
    pub fn add_performance_data(&mut self, reading: ExtendedReading) {
        debug!(
            "Added performance data: V={:.2}V, I={:.2}A, Health={:.1}%",
            reading.reading.pack_voltage, reading.reading.pack_current, reading.health_score
        );
        self.history.push(reading);
    }

    /// Replace the battery specifications
    pub fn update_specs(&mut self, specs: BatterySpecs) {
        self.specs = specs;
        info!("Battery specifications updated");
    }

    /// Try the given strategy before the analytical model
    pub fn enable_external(&mut self, strategy: impl PredictionStrategy + 'static) {
        self.external = Some(Box::new(strategy));
        info!("External prediction enabled");
    }

    /// Use only the analytical model
    pub fn disable_external(&mut self) {
        self.external = None;
        info!("External prediction disabled");
    }

    /// Whether an external strategy is configured
    pub fn external_enabled(&self) -> bool {
        self.external.is_some()
    }

    /// Predict remaining battery life
    ///
    /// Returns the zero prediction when fewer than
    /// [`MIN_READINGS_FOR_PREDICTION`] readings are held.
    pub fn predict_battery_life(&mut self) -> Prediction {
        match self.try_predict() {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("Insufficient data for prediction: {}", e);
                Prediction::zero()
            }
        }
    }

    fn try_predict(&mut self) -> Result<Prediction, PredictionError> {
        if self.history.len() < MIN_READINGS_FOR_PREDICTION {
            return Err(PredictionError::InsufficientData {
                required: MIN_READINGS_FOR_PREDICTION,
                available: self.history.len(),
            });
        }

        if let Some(external) = self.external.as_mut() {
            let source = external.source();
            match external.predict(&self.history, &self.specs) {
                Ok(estimate) => return Ok(self.log.push(estimate, source)),
                Err(e) => warn!("{} prediction failed, using analytical model: {}", source, e),
            }
        }

        let estimate = self.analytical.predict(&self.history, &self.specs)?;
        Ok(self.log.push(estimate, PredictionSource::Analytical))
    }

    /// Readings held
    pub fn history(&self) -> &History<ExtendedReading> {
        &self.history
    }

    /// Battery specifications in use
    pub fn specs(&self) -> &BatterySpecs {
        &self.specs
    }

    /// Every prediction produced so far
    pub fn log(&self) -> &PredictionLog {
        &self.log
    }

    /// Report of the latest prediction
    pub fn report(&self) -> String {
        self.log.report()
    }
}

impl fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("specs", &self.specs)
            .field("history_len", &self.history.len())
            .field("predictions", &self.log.len())
            .field("external", &self.external.is_some())
            .finish()
    }
}
