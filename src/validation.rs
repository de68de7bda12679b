// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Physical plausibility checks
//!
//! These bounds reject corrupt or garbage frames. They are much wider than
//! the alert thresholds in [`crate::classifier`], which describe the
//! operating envelope of a healthy pack.

use crate::error::ValidationError;
use crate::protocol::Reading;
use std::fmt;

/// Reading field, used as the rejection reason tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    Voltage,
    Current,
    Temperature,
}

impl Field {
    /// All fields in validation order
    pub const ALL: [Field; 4] = [
        Field::Timestamp,
        Field::Voltage,
        Field::Current,
        Field::Temperature,
    ];

    /// Inclusive sanity bounds for this field
    pub fn bounds(&self) -> (f32, f32) {
        match self {
            Self::Timestamp => (0.0, f32::INFINITY),
            Self::Voltage => (0.0, 100.0),
            Self::Current => (-1000.0, 1000.0),
            Self::Temperature => (-100.0, 200.0),
        }
    }

    /// Extract this field's value from a reading
    pub fn value(&self, reading: &Reading) -> f32 {
        match self {
            Self::Timestamp => reading.timestamp,
            Self::Voltage => reading.pack_voltage,
            Self::Current => reading.pack_current,
            Self::Temperature => reading.cell_temp,
        }
    }

    fn check(&self, reading: &Reading) -> Result<(), ValidationError> {
        let (min, max) = self.bounds();
        let value = self.value(reading);
        // NaN fails `contains`
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::FieldOutOfRange {
                field: *self,
                value,
                min,
                max,
            })
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timestamp => "timestamp",
            Self::Voltage => "pack_voltage",
            Self::Current => "pack_current",
            Self::Temperature => "cell_temp",
        };
        f.write_str(name)
    }
}

/// Check a reading against the sanity bounds
///
/// Reports the first failing field in [`Field::ALL`] order.
pub fn validate(reading: &Reading) -> Result<(), ValidationError> {
    Field::ALL.iter().try_for_each(|field| field.check(reading))
}

/// True when no field of the reading is plausible
///
/// A frame like this almost always means the sender uses a different float
/// layout, so the session reports it as malformed rather than as a bad sample.
pub fn is_implausible(reading: &Reading) -> bool {
    Field::ALL.iter().all(|field| field.check(reading).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_reading() {
        assert!(validate(&Reading::new(0.0, 3.7, 1.0, 25.0)).is_ok());
        assert!(validate(&Reading::new(5.0, 100.0, -1000.0, 200.0)).is_ok());
        assert!(validate(&Reading::new(5.0, 0.0, 1000.0, -100.0)).is_ok());
    }

    #[test]
    fn test_out_of_range_fields() {
        let cases = [
            (Reading::new(-1.0, 3.7, 1.0, 25.0), Field::Timestamp),
            (Reading::new(1.0, 150.0, 1.0, 25.0), Field::Voltage),
            (Reading::new(1.0, -0.5, 1.0, 25.0), Field::Voltage),
            (Reading::new(1.0, 3.7, 1500.0, 25.0), Field::Current),
            (Reading::new(1.0, 3.7, 1.0, 250.0), Field::Temperature),
        ];
        for (reading, field) in cases {
            let err = validate(&reading).unwrap_err();
            assert_eq!(err.field(), field, "reading {:?}", reading);
        }
    }

    #[test]
    fn test_nan_rejected() {
        let err = validate(&Reading::new(1.0, f32::NAN, 1.0, 25.0)).unwrap_err();
        assert_eq!(err.field(), Field::Voltage);
    }

    #[test]
    fn test_first_failure_reported() {
        let err = validate(&Reading::new(1.0, 500.0, 5000.0, 25.0)).unwrap_err();
        assert_eq!(err.field(), Field::Voltage);
    }

    #[test]
    fn test_implausible() {
        assert!(is_implausible(&Reading::new(-5.0, 1e9, -1e9, f32::NAN)));
        assert!(!is_implausible(&Reading::new(-5.0, 1e9, -1e9, 25.0)));
    }
}
