// Packwatch Testdata - Degradation series
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Hourly extended readings of a steadily ageing pack, for exercising the
//! prediction engine.

use packwatch::{ExtendedReading, Reading};
use std::fs;
use std::io;
use std::path::Path;

/// Seconds between consecutive readings
pub const SAMPLE_INTERVAL_SECS: f32 = 3600.0;

/// Deterministic degradation series
///
/// Reading `i` has health `90 - 0.8 i`, capacity `85 - 0.5 i`,
/// `10 i` cycles and an age of `6 + 0.5 i` months.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationSeries {
    count: usize,
}

impl DegradationSeries {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reading at position `i`
    pub fn reading(i: usize) -> ExtendedReading {
        let step = i as f32;
        let reading = Reading::new(
            SAMPLE_INTERVAL_SECS * step,
            350.0 + (i % 10) as f32 * 2.0,
            50.0 + (i % 5) as f32 * 10.0,
            25.0 + (i % 3) as f32 * 5.0,
        );
        ExtendedReading::new(reading)
            .with_capacity(85.0 - 0.5 * step)
            .with_cycles(10 * i as u32)
            .with_age_months(6.0 + 0.5 * step)
            .with_health(90.0 - 0.8 * step)
    }

    pub fn iter(&self) -> impl Iterator<Item = ExtendedReading> {
        (0..self.count).map(Self::reading)
    }

    /// Write the series as a JSON array
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), io::Error> {
        let readings: Vec<_> = self.iter().collect();
        let json = serde_json::to_string_pretty(&readings)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}
