// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Packwatch
//!
//! Every stage of the telemetry pipeline reports failures through one of the
//! enums below. Only [`PackwatchError::Bind`] is fatal to the process; the
//! others are recovered from at the stage that produced them.

use crate::validation::Field;
use thiserror::Error;

/// Result type alias for Packwatch operations
pub type Result<T> = std::result::Result<T, PackwatchError>;

/// Main error type for Packwatch operations
#[derive(Error, Debug)]
pub enum PackwatchError {
    /// Frame transport error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Reading rejected by sanity validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Prediction could not be produced
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telemetry could not be delivered
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The listening endpoint could not be established
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while reading fixed-size frames off a byte stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Peer closed the stream before a full frame arrived
    #[error("Incomplete frame: received {received} of 16 bytes")]
    Incomplete { received: usize },

    /// Every field of the decoded reading is implausible
    #[error("Malformed frame: no field within sanity bounds")]
    Malformed,

    /// Shutdown was requested while waiting for data
    #[error("Frame read cancelled")]
    Cancelled,

    /// Underlying transport failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl FrameError {
    /// Whether this error ends the session without being a fault
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Incomplete { .. } | Self::Cancelled)
    }
}

/// Sanity validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A field lies outside its physical plausibility range
    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    FieldOutOfRange {
        field: Field,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl ValidationError {
    /// The field that failed
    pub fn field(&self) -> Field {
        match self {
            Self::FieldOutOfRange { field, .. } => *field,
        }
    }
}

/// Errors inside the prediction engine
///
/// None of these escape [`crate::prediction::PredictionEngine::predict_battery_life`];
/// they select the fallback path instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Not enough history to predict
    #[error("Insufficient data: need {required} readings, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// The generative service could not be reached or refused the request
    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    /// The generative service answered with something we cannot use
    #[error("Failed to parse prediction: {0}")]
    ParseFailure(String),
}

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    /// File content is not valid for the expected schema
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// Telemetry delivery errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// The backend answered with a non-success status
    #[error("Backend rejected telemetry with HTTP {status}")]
    Rejected { status: u16 },

    /// The request never completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameError::Incomplete { received: 7 };
        assert_eq!(err.to_string(), "Incomplete frame: received 7 of 16 bytes");

        let err = ValidationError::FieldOutOfRange {
            field: Field::Voltage,
            value: 150.0,
            min: 0.0,
            max: 100.0,
        };
        assert!(err.to_string().contains("pack_voltage"));
        assert_eq!(err.field(), Field::Voltage);
    }

    #[test]
    fn test_error_conversion() {
        let frame_err = FrameError::Malformed;
        let err: PackwatchError = frame_err.into();
        assert!(matches!(err, PackwatchError::Frame(_)));

        let sink_err = SinkError::Rejected { status: 503 };
        let err: PackwatchError = sink_err.into();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(FrameError::Incomplete { received: 0 }.is_disconnect());
        assert!(FrameError::Cancelled.is_disconnect());
        assert!(!FrameError::Io("reset".into()).is_disconnect());
        assert!(!FrameError::Malformed.is_disconnect());
    }
}
