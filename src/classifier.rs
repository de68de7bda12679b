// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert classification module
//!
//! Maps a validated reading to a [`Severity`] using the operating envelope
//! in [`Thresholds`], and builds the human-readable alert text.
//!
//! Severity precedence is fixed: voltage outside its envelope is CRITICAL,
//! then current outside is WARNING, then temperature outside is CRITICAL.
//! A reading that violates current and temperature is therefore WARNING.

use crate::protocol::Reading;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// Inside the operating envelope
    #[default]
    Normal,
    /// Current outside its envelope
    Warning,
    /// Voltage or temperature outside its envelope
    Critical,
    /// Packet-level failure, never produced by [`classify`]
    Error,
}

impl Severity {
    /// Upper-case label used in logs and dashboards
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
        }
    }

    /// Whether this severity should raise an alert
    pub fn is_alert(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operating envelope of a healthy pack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_voltage: f32,
    pub max_voltage: f32,
    pub min_current: f32,
    pub max_current: f32,
    pub min_temp: f32,
    pub max_temp: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_voltage: 3.0,
            max_voltage: 4.2,
            min_current: -50.0,
            max_current: 50.0,
            min_temp: -20.0,
            max_temp: 60.0,
        }
    }
}

impl Thresholds {
    fn voltage_ok(&self, v: f32) -> bool {
        (self.min_voltage..=self.max_voltage).contains(&v)
    }

    fn current_ok(&self, i: f32) -> bool {
        (self.min_current..=self.max_current).contains(&i)
    }

    fn temp_ok(&self, t: f32) -> bool {
        (self.min_temp..=self.max_temp).contains(&t)
    }
}

/// Condition named in an alert message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertCondition {
    LowVoltage(f32),
    HighVoltage(f32),
    HighTemperature(f32),
    LowTemperature(f32),
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowVoltage(v) => write!(f, "Low voltage ({:.2}V)", v),
            Self::HighVoltage(v) => write!(f, "High voltage ({:.2}V)", v),
            Self::HighTemperature(t) => write!(f, "High temperature ({:.2}°C)", t),
            Self::LowTemperature(t) => write!(f, "Low temperature ({:.2}°C)", t),
        }
    }
}

/// Outcome of classifying one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    /// Assigned severity
    pub severity: Severity,
    /// Condition to report, if any
    pub condition: Option<AlertCondition>,
}

impl Assessment {
    /// Assessment for a reading inside the envelope
    pub fn normal() -> Self {
        Self {
            severity: Severity::Normal,
            condition: None,
        }
    }

    /// Full alert line (`"ALERT: ..."`), when there is something to say
    ///
    /// A current-only violation is WARNING but carries no message.
    pub fn message(&self) -> Option<String> {
        if !self.severity.is_alert() {
            return None;
        }
        self.condition.map(|c| format!("ALERT: {}", c))
    }
}

/// Severity for a reading under the given thresholds
pub fn classify(reading: &Reading, thresholds: &Thresholds) -> Severity {
    if !thresholds.voltage_ok(reading.pack_voltage) {
        return Severity::Critical;
    }
    if !thresholds.current_ok(reading.pack_current) {
        return Severity::Warning;
    }
    if !thresholds.temp_ok(reading.cell_temp) {
        return Severity::Critical;
    }
    Severity::Normal
}

/// Alert text for a reading, `None` when it is NORMAL or only current is off
pub fn alert_message(reading: &Reading, thresholds: &Thresholds) -> Option<String> {
    Classifier::with_thresholds(*thresholds)
        .assess(reading)
        .message()
}

/// Classifier bound to one set of thresholds
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    /// Create a classifier with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with custom thresholds
    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classify a reading and pick the condition to report
    pub fn assess(&self, reading: &Reading) -> Assessment {
        let severity = classify(reading, &self.thresholds);
        if severity == Severity::Normal {
            return Assessment::normal();
        }
        Assessment {
            severity,
            condition: self.condition_for(reading),
        }
    }

    fn condition_for(&self, reading: &Reading) -> Option<AlertCondition> {
        let t = &self.thresholds;
        if reading.pack_voltage < t.min_voltage {
            Some(AlertCondition::LowVoltage(reading.pack_voltage))
        } else if reading.pack_voltage > t.max_voltage {
            Some(AlertCondition::HighVoltage(reading.pack_voltage))
        } else if reading.cell_temp > t.max_temp {
            Some(AlertCondition::HighTemperature(reading.cell_temp))
        } else if reading.cell_temp < t.min_temp {
            Some(AlertCondition::LowTemperature(reading.cell_temp))
        } else {
            None
        }
    }

    /// Per-field status bands for display
    pub fn field_status(&self, reading: &Reading) -> FieldStatuses {
        FieldStatuses::evaluate(reading, &self.thresholds)
    }
}

/// Display band of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Normal,
    Warning,
    Critical,
}

/// Status bands for voltage, current and temperature
///
/// Warning bands sit just inside the envelope: within 10% of the voltage
/// and current limits, within 5°C of the temperature limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStatuses {
    pub voltage: FieldStatus,
    pub current: FieldStatus,
    pub temperature: FieldStatus,
}

impl FieldStatuses {
    /// Evaluate all three fields
    pub fn evaluate(reading: &Reading, t: &Thresholds) -> Self {
        let v = reading.pack_voltage;
        let voltage = if !t.voltage_ok(v) {
            FieldStatus::Critical
        } else if v < t.min_voltage * 1.1 || v > t.max_voltage * 0.9 {
            FieldStatus::Warning
        } else {
            FieldStatus::Normal
        };

        let i = reading.pack_current;
        let current = if !t.current_ok(i) {
            FieldStatus::Critical
        } else if i < t.min_current * 0.9 || i > t.max_current * 0.9 {
            FieldStatus::Warning
        } else {
            FieldStatus::Normal
        };

        let c = reading.cell_temp;
        let temperature = if !t.temp_ok(c) {
            FieldStatus::Critical
        } else if c < t.min_temp + 5.0 || c > t.max_temp - 5.0 {
            FieldStatus::Warning
        } else {
            FieldStatus::Normal
        };

        Self {
            voltage,
            current,
            temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(v: f32, i: f32, t: f32) -> Reading {
        Reading::new(0.0, v, i, t)
    }

    #[test]
    fn test_normal() {
        let thresholds = Thresholds::default();
        assert_eq!(classify(&reading(3.7, 1.0, 25.0), &thresholds), Severity::Normal);
        assert_eq!(alert_message(&reading(3.7, 1.0, 25.0), &thresholds), None);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let thresholds = Thresholds::default();
        assert_eq!(classify(&reading(3.0, -50.0, -20.0), &thresholds), Severity::Normal);
        assert_eq!(classify(&reading(4.2, 50.0, 60.0), &thresholds), Severity::Normal);
    }

    #[test]
    fn test_low_voltage_critical() {
        let thresholds = Thresholds::default();
        let r = reading(2.0, 1.0, 25.0);
        assert_eq!(classify(&r, &thresholds), Severity::Critical);
        assert_eq!(
            alert_message(&r, &thresholds).as_deref(),
            Some("ALERT: Low voltage (2.00V)")
        );
    }

    #[test]
    fn test_current_only_warning_has_no_message() {
        let thresholds = Thresholds::default();
        let r = reading(3.7, 80.0, 25.0);
        assert_eq!(classify(&r, &thresholds), Severity::Warning);
        assert_eq!(alert_message(&r, &thresholds), None);
    }

    #[test]
    fn test_current_takes_precedence_over_temperature() {
        let thresholds = Thresholds::default();
        let r = reading(3.7, 80.0, 70.0);
        let assessment = Classifier::with_thresholds(thresholds).assess(&r);
        assert_eq!(assessment.severity, Severity::Warning);
        assert_eq!(
            assessment.message().as_deref(),
            Some("ALERT: High temperature (70.00°C)")
        );
    }

    #[test]
    fn test_high_temperature_critical() {
        let thresholds = Thresholds::default();
        let r = reading(3.7, 1.0, 65.0);
        assert_eq!(classify(&r, &thresholds), Severity::Critical);
        assert_eq!(
            alert_message(&r, &thresholds).as_deref(),
            Some("ALERT: High temperature (65.00°C)")
        );
    }

    #[test]
    fn test_voltage_message_wins_over_temperature() {
        let thresholds = Thresholds::default();
        let r = reading(4.5, 1.0, -30.0);
        assert_eq!(
            alert_message(&r, &thresholds).as_deref(),
            Some("ALERT: High voltage (4.50V)")
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = Thresholds {
            min_voltage: 300.0,
            max_voltage: 400.0,
            ..Thresholds::default()
        };
        assert_eq!(classify(&reading(355.0, 1.0, 25.0), &thresholds), Severity::Normal);
        assert_eq!(classify(&reading(3.7, 1.0, 25.0), &thresholds), Severity::Critical);
    }

    #[test]
    fn test_field_status_bands() {
        let classifier = Classifier::new();
        let statuses = classifier.field_status(&reading(3.2, 1.0, 57.0));
        assert_eq!(statuses.voltage, FieldStatus::Warning);
        assert_eq!(statuses.current, FieldStatus::Normal);
        assert_eq!(statuses.temperature, FieldStatus::Warning);

        let statuses = classifier.field_status(&reading(3.6, 60.0, 25.0));
        assert_eq!(statuses.voltage, FieldStatus::Normal);
        assert_eq!(statuses.current, FieldStatus::Critical);
        assert_eq!(statuses.temperature, FieldStatus::Normal);
    }

    #[test]
    fn test_thresholds_partial_json() {
        let thresholds: Thresholds = serde_json::from_str(r#"{"max_temp": 45.0}"#).unwrap();
        assert_eq!(thresholds.max_temp, 45.0);
        assert_eq!(thresholds.min_voltage, 3.0);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert!(!Severity::Normal.is_alert());
        assert!(Severity::Warning.is_alert());
    }
}
