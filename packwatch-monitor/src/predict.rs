// Packwatch Monitor - Battery telemetry monitor daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Offline battery life prediction from a recorded history file.
//!
//! The input is a JSON array of extended readings, as written by
//! `packwatch-sim degradation`.

use packwatch::prediction::external::{ExternalStrategy, GeminiBackend};
use packwatch::{BatterySpecs, ExtendedReading, Prediction, PredictionEngine};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Timeout for the generative backend call
const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors loading a history file
#[derive(Debug, Error)]
pub enum HistoryFileError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid history in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Options for one prediction run
#[derive(Debug, Clone)]
pub struct PredictOptions {
    pub input: PathBuf,
    pub specs: PathBuf,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

/// Load a JSON array of extended readings
pub fn load_history(path: &Path) -> Result<Vec<ExtendedReading>, HistoryFileError> {
    let contents = fs::read_to_string(path).map_err(|source| HistoryFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| HistoryFileError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Feed `readings` to a fresh engine and predict once
pub fn run_engine(
    readings: Vec<ExtendedReading>,
    specs: BatterySpecs,
    external: Option<ExternalStrategy<GeminiBackend>>,
) -> (Prediction, PredictionEngine) {
    let mut engine = PredictionEngine::new(specs);
    if let Some(strategy) = external {
        engine.enable_external(strategy);
    }
    for reading in readings {
        engine.add_performance_data(reading);
    }
    let prediction = engine.predict_battery_life();
    (prediction, engine)
}

/// Run a prediction and return the printable report
pub fn run(options: &PredictOptions) -> Result<String, HistoryFileError> {
    let readings = load_history(&options.input)?;
    info!(
        "Loaded {} readings from {}",
        readings.len(),
        options.input.display()
    );

    let specs = BatterySpecs::load_or_default(&options.specs);
    let external = options.api_key.as_ref().map(|key| {
        let backend = match &options.api_url {
            Some(url) => GeminiBackend::with_endpoint(key.clone(), url.clone(), BACKEND_TIMEOUT),
            None => GeminiBackend::new(key.clone()),
        };
        ExternalStrategy::new(backend)
    });

    let (prediction, engine) = run_engine(readings, specs, external);
    if prediction.is_zero() && engine.log().is_empty() {
        return Ok(format!(
            "Not enough data for a prediction ({} readings in history)\n",
            engine.history().len()
        ));
    }
    Ok(engine.report())
}
