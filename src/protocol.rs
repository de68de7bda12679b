// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Wire format and reading types
//!
//! A frame is exactly [`FRAME_SIZE`] bytes: four 32-bit floats in the
//! host's native byte order, laid out as
//! `[timestamp, pack_voltage, pack_current, cell_temp]`.
//! Senders and receivers are assumed to share endianness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of one frame on the wire
pub const FRAME_SIZE: usize = 16;

/// Number of frames in one module batch (module + three sub-packs)
pub const DEFAULT_BATCH_FRAMES: usize = 4;

/// One telemetry sample from a battery pack
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the sender started
    pub timestamp: f32,
    /// Pack voltage (V)
    pub pack_voltage: f32,
    /// Pack current (A), negative while discharging
    pub pack_current: f32,
    /// Cell temperature (°C)
    pub cell_temp: f32,
}

impl Reading {
    /// Create a new reading
    pub fn new(timestamp: f32, pack_voltage: f32, pack_current: f32, cell_temp: f32) -> Self {
        Self {
            timestamp,
            pack_voltage,
            pack_current,
            cell_temp,
        }
    }

    /// Encode into a wire frame
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        let fields = [
            self.timestamp,
            self.pack_voltage,
            self.pack_current,
            self.cell_temp,
        ];
        for (chunk, value) in frame.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        frame
    }

    /// Decode a wire frame
    ///
    /// Any 16 bytes decode; plausibility is checked by
    /// [`crate::validation::validate`].
    pub fn decode(frame: &[u8; FRAME_SIZE]) -> Self {
        let field = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&frame[i * 4..i * 4 + 4]);
            f32::from_ne_bytes(bytes)
        };
        Self {
            timestamp: field(0),
            pack_voltage: field(1),
            pack_current: field(2),
            cell_temp: field(3),
        }
    }
}

fn full_percentage() -> f32 {
    100.0
}

/// A reading enriched with the degradation fields used for prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtendedReading {
    #[serde(flatten)]
    pub reading: Reading,
    /// Remaining capacity (%)
    #[serde(default = "full_percentage", alias = "capacity_remaining")]
    pub capacity_remaining_pct: f32,
    /// Completed charge cycles
    #[serde(default)]
    pub cycle_count: u32,
    /// Age of the pack in months
    #[serde(default)]
    pub age_months: f32,
    /// State of health (%)
    #[serde(default = "full_percentage")]
    pub health_score: f32,
}

impl ExtendedReading {
    /// Wrap a raw reading with a fresh pack's degradation fields
    pub fn new(reading: Reading) -> Self {
        Self {
            reading,
            capacity_remaining_pct: 100.0,
            cycle_count: 0,
            age_months: 0.0,
            health_score: 100.0,
        }
    }

    /// Set remaining capacity
    pub fn with_capacity(mut self, pct: f32) -> Self {
        self.capacity_remaining_pct = pct;
        self
    }

    /// Set cycle count
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycle_count = cycles;
        self
    }

    /// Set age
    pub fn with_age_months(mut self, months: f32) -> Self {
        self.age_months = months;
        self
    }

    /// Set health score
    pub fn with_health(mut self, score: f32) -> Self {
        self.health_score = score;
        self
    }
}

impl From<Reading> for ExtendedReading {
    fn from(reading: Reading) -> Self {
        Self::new(reading)
    }
}

/// Identifies which unit a reading describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// Whole pack, single-reading protocol
    Pack,
    /// Module summary, first frame of a batch
    Module,
    /// Sub-pack `n` (1-based) of a batch
    SubPack(u8),
}

impl SourceTag {
    /// Tag for the frame at `index` within a batch
    pub fn for_batch_index(index: usize) -> Self {
        match index {
            0 => Self::Module,
            n => Self::SubPack(u8::try_from(n).unwrap_or(u8::MAX)),
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pack => write!(f, "pack"),
            Self::Module => write!(f, "module"),
            Self::SubPack(n) => write!(f, "battery_{}", n),
        }
    }
}

/// How frames are grouped on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FrameProtocol {
    /// Every frame is one reading for the whole pack
    #[default]
    SingleReading,
    /// Frames arrive in groups: one module frame followed by sub-pack frames
    ModuleBatch {
        /// Frames per batch, including the module frame
        frames: usize,
    },
}

impl FrameProtocol {
    /// Module batch with the standard four frames
    pub fn module_batch() -> Self {
        Self::ModuleBatch {
            frames: DEFAULT_BATCH_FRAMES,
        }
    }

    /// Frames per logical group, never less than one
    pub fn frames_per_group(&self) -> usize {
        match self {
            Self::SingleReading => 1,
            Self::ModuleBatch { frames } => (*frames).max(1),
        }
    }

    /// Source tag for the frame at `index` within its group
    pub fn tag(&self, index: usize) -> SourceTag {
        match self {
            Self::SingleReading => SourceTag::Pack,
            Self::ModuleBatch { .. } => SourceTag::for_batch_index(index),
        }
    }
}

impl fmt::Display for FrameProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleReading => write!(f, "single"),
            Self::ModuleBatch { frames } if *frames == DEFAULT_BATCH_FRAMES => {
                write!(f, "module_batch")
            }
            Self::ModuleBatch { frames } => write!(f, "module_batch:{}", frames),
        }
    }
}

impl FromStr for FrameProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, count) = match s.split_once(':') {
            Some((kind, count)) => (kind, Some(count)),
            None => (s, None),
        };
        match (kind.trim().to_lowercase().as_str(), count) {
            ("single" | "single_reading", None) => Ok(Self::SingleReading),
            ("batch" | "module_batch", None) => Ok(Self::module_batch()),
            ("batch" | "module_batch", Some(count)) => match count.trim().parse::<usize>() {
                Ok(frames) if frames >= 1 => Ok(Self::ModuleBatch { frames }),
                _ => Err(format!("invalid batch size '{}'", count)),
            },
            _ => Err(format!("unknown frame protocol '{}'", s)),
        }
    }
}

impl TryFrom<String> for FrameProtocol {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameProtocol> for String {
    fn from(protocol: FrameProtocol) -> Self {
        protocol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_frame_layout() {
        let reading = Reading::new(1.0, 3.7, 2.5, 25.0);
        let frame = reading.encode();

        assert_eq!(frame.len(), FRAME_SIZE);
        assert_eq!(&frame[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&frame[4..8], &3.7f32.to_ne_bytes());
        assert_eq!(&frame[8..12], &2.5f32.to_ne_bytes());
        assert_eq!(&frame[12..16], &25.0f32.to_ne_bytes());
    }

    #[test]
    fn test_decode_preserves_bits() {
        let reading = Reading::new(12345.5, -0.0, f32::MIN_POSITIVE, -40.25);
        let decoded = Reading::decode(&reading.encode());
        assert_eq!(decoded.timestamp.to_bits(), reading.timestamp.to_bits());
        assert_eq!(decoded.pack_voltage.to_bits(), reading.pack_voltage.to_bits());
        assert_eq!(decoded.pack_current.to_bits(), reading.pack_current.to_bits());
        assert_eq!(decoded.cell_temp.to_bits(), reading.cell_temp.to_bits());
    }

    #[test]
    fn test_source_tags() {
        let protocol = FrameProtocol::module_batch();
        assert_eq!(protocol.frames_per_group(), 4);
        assert_eq!(protocol.tag(0).to_string(), "module");
        assert_eq!(protocol.tag(1).to_string(), "battery_1");
        assert_eq!(protocol.tag(3).to_string(), "battery_3");
        assert_eq!(FrameProtocol::SingleReading.tag(0), SourceTag::Pack);
        assert_eq!(FrameProtocol::ModuleBatch { frames: 0 }.frames_per_group(), 1);
    }

    #[test]
    fn test_random_readings_survive_encoding() {
        let mut rng = StdRng::seed_from_u64(0xf4a3e);
        for _ in 0..10_000 {
            let reading = Reading::new(
                rng.gen_range(0.0..1e7),
                rng.gen_range(-1000.0..1000.0),
                rng.gen_range(-1e4..1e4),
                rng.gen_range(-273.0..500.0),
            );
            assert_eq!(Reading::decode(&reading.encode()), reading);
        }

        // Arbitrary bit patterns, NaN payloads included
        for _ in 0..10_000 {
            let bits: [u32; 4] = rng.gen();
            let frame: Vec<u8> = bits.iter().flat_map(|b| b.to_ne_bytes()).collect();
            let frame: [u8; FRAME_SIZE] = frame.try_into().unwrap();
            assert_eq!(Reading::decode(&frame).encode(), frame);
        }
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("single".parse(), Ok(FrameProtocol::SingleReading));
        assert_eq!("module_batch".parse(), Ok(FrameProtocol::module_batch()));
        assert_eq!(
            "batch:6".parse(),
            Ok(FrameProtocol::ModuleBatch { frames: 6 })
        );
        assert!("batch:0".parse::<FrameProtocol>().is_err());
        assert!("carrier-pigeon".parse::<FrameProtocol>().is_err());
        assert_eq!(FrameProtocol::module_batch().to_string(), "module_batch");
    }

    #[test]
    fn test_extended_reading_defaults() {
        let json = r#"{"timestamp": 0.0, "pack_voltage": 350.0, "pack_current": 50.0, "cell_temp": 25.0}"#;
        let extended: ExtendedReading = serde_json::from_str(json).unwrap();
        assert_eq!(extended.capacity_remaining_pct, 100.0);
        assert_eq!(extended.health_score, 100.0);
        assert_eq!(extended.cycle_count, 0);
        assert_eq!(extended.reading.pack_voltage, 350.0);
    }
}
