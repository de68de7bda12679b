// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Running statistics over the telemetry stream
//!
//! Aggregates persist across sessions for the lifetime of the process.

use crate::protocol::Reading;

/// Running aggregate of everything the monitor has received
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    /// Frames received, valid or not
    pub total_count: u64,
    /// Frames that passed validation
    pub valid_count: u64,
    /// Frames rejected by validation
    pub error_count: u64,
    /// Mean pack voltage over valid readings
    pub mean_voltage: f64,
    /// Mean pack current over valid readings
    pub mean_current: f64,
    /// Mean cell temperature over valid readings
    pub mean_temp: f64,
    /// Lowest valid voltage seen (+∞ until the first reading)
    pub min_voltage: f32,
    /// Highest valid voltage seen (−∞ until the first reading)
    pub max_voltage: f32,
    /// Lowest valid temperature seen
    pub min_temp: f32,
    /// Highest valid temperature seen
    pub max_temp: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_count: 0,
            valid_count: 0,
            error_count: 0,
            mean_voltage: 0.0,
            mean_current: 0.0,
            mean_temp: 0.0,
            min_voltage: f32::INFINITY,
            max_voltage: f32::NEG_INFINITY,
            min_temp: f32::INFINITY,
            max_temp: f32::NEG_INFINITY,
        }
    }
}

impl Stats {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a validated reading into the aggregate
    pub fn record_valid(&mut self, reading: &Reading) {
        self.total_count += 1;
        self.valid_count += 1;

        let voltage = f64::from(reading.pack_voltage);
        let current = f64::from(reading.pack_current);
        let temp = f64::from(reading.cell_temp);
        if self.valid_count == 1 {
            self.mean_voltage = voltage;
            self.mean_current = current;
            self.mean_temp = temp;
        } else {
            let n = self.valid_count as f64;
            self.mean_voltage = (self.mean_voltage * (n - 1.0) + voltage) / n;
            self.mean_current = (self.mean_current * (n - 1.0) + current) / n;
            self.mean_temp = (self.mean_temp * (n - 1.0) + temp) / n;
        }

        self.min_voltage = self.min_voltage.min(reading.pack_voltage);
        self.max_voltage = self.max_voltage.max(reading.pack_voltage);
        self.min_temp = self.min_temp.min(reading.cell_temp);
        self.max_temp = self.max_temp.max(reading.cell_temp);
    }

    /// Count a rejected frame
    pub fn record_error(&mut self) {
        self.total_count += 1;
        self.error_count += 1;
    }

    /// Share of frames that passed validation, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.valid_count as f64 / self.total_count as f64 * 100.0
    }

    /// Whether any valid reading has been aggregated
    pub fn has_readings(&self) -> bool {
        self.valid_count > 0
    }

    /// Reset all counters and aggregates
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Battery Monitor Statistics ===\n");
        report.push_str(&format!("Total packets received: {}\n", self.total_count));
        report.push_str(&format!("Valid packets: {}\n", self.valid_count));
        report.push_str(&format!("Error packets: {}\n", self.error_count));
        report.push_str(&format!("Success rate: {:.1}%\n", self.success_rate()));

        if self.has_readings() {
            report.push_str(&format!(
                "Voltage: mean {:.3}V, range [{:.3}V, {:.3}V]\n",
                self.mean_voltage, self.min_voltage, self.max_voltage
            ));
            report.push_str(&format!("Current: mean {:.3}A\n", self.mean_current));
            report.push_str(&format!(
                "Temperature: mean {:.2}°C, range [{:.2}°C, {:.2}°C]\n",
                self.mean_temp, self.min_temp, self.max_temp
            ));
        } else {
            report.push_str("No valid readings recorded\n");
        }

        report
    }
}
