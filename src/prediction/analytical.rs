// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Closed-form battery life model
//!
//! - degradation: `(100 - avg_health) / 100 * 0.1`, scaled up above 45°C
//!   (`1.5 + (avg_temp - 45) * 0.1`) and below 10°C (`1.2`)
//! - cycles: rated cycle life minus the latest cycle count, floored at zero
//! - life: latest remaining capacity (Ah) divided by mean |current|

use super::{recommendations, Estimate, HistorySummary, Prediction, PredictionSource};
use super::PredictionStrategy;
use crate::config::BatterySpecs;
use crate::error::PredictionError;
use crate::history::History;
use crate::protocol::ExtendedReading;

/// Readings the analytical model needs before it returns anything but zero
pub const MIN_ANALYTICAL_READINGS: usize = 5;

/// Confidence attached to analytical estimates
pub const ANALYTICAL_CONFIDENCE: f64 = 0.7;

/// Health loss per cycle for the given averages
pub fn degradation_rate(avg_health: f64, avg_temp: f64) -> f64 {
    let base_rate = (100.0 - avg_health) / 100.0 * 0.1;
    let temp_factor = if avg_temp > 45.0 {
        1.5 + (avg_temp - 45.0) * 0.1
    } else if avg_temp < 10.0 {
        1.2
    } else {
        1.0
    };
    base_rate * temp_factor
}

/// Hours of runtime left at the average absolute draw
pub fn remaining_life_hours(
    latest: &ExtendedReading,
    avg_abs_current: f64,
    specs: &BatterySpecs,
) -> f64 {
    if avg_abs_current <= 0.0 {
        return 0.0;
    }
    let remaining_ah = f64::from(latest.capacity_remaining_pct) / 100.0 * specs.nominal_capacity_ah;
    remaining_ah / avg_abs_current
}

/// Predict from the whole history
///
/// Fewer than [`MIN_ANALYTICAL_READINGS`] readings give the zero prediction.
pub fn predict(history: &History<ExtendedReading>, specs: &BatterySpecs) -> Prediction {
    match usable(history) {
        Some((summary, latest)) => predict_from_summary(&summary, latest, specs),
        None => Prediction::zero(),
    }
}

/// Summary and latest reading, or None below [`MIN_ANALYTICAL_READINGS`]
fn usable(history: &History<ExtendedReading>) -> Option<(HistorySummary, &ExtendedReading)> {
    let summary = HistorySummary::from_history(history)?;
    if summary.count < MIN_ANALYTICAL_READINGS {
        return None;
    }
    Some((summary, history.latest()?))
}

fn predict_from_summary(
    summary: &HistorySummary,
    latest: &ExtendedReading,
    specs: &BatterySpecs,
) -> Prediction {
    Prediction {
        remaining_life_hours: remaining_life_hours(latest, summary.avg_abs_current, specs),
        remaining_cycles: (f64::from(specs.max_cycles) - f64::from(latest.cycle_count)).max(0.0),
        degradation_rate: degradation_rate(summary.avg_health, summary.avg_temp),
    }
}

/// The analytical model as a [`PredictionStrategy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticalStrategy;

impl AnalyticalStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl PredictionStrategy for AnalyticalStrategy {
    fn source(&self) -> PredictionSource {
        PredictionSource::Analytical
    }

    fn predict(
        &mut self,
        history: &History<ExtendedReading>,
        specs: &BatterySpecs,
    ) -> Result<Estimate, PredictionError> {
        let Some((summary, latest)) = usable(history) else {
            return Ok(Estimate::new(Prediction::zero(), 0.0));
        };

        Ok(Estimate {
            prediction: predict_from_summary(&summary, latest, specs),
            confidence: ANALYTICAL_CONFIDENCE,
            recommendations: recommendations(&summary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Reading;
    use approx::assert_relative_eq;

    fn entry(current: f32, temp: f32, health: f32) -> ExtendedReading {
        ExtendedReading::new(Reading::new(0.0, 350.0, current, temp)).with_health(health)
    }

    #[test]
    fn test_degradation_rate_bands() {
        assert_relative_eq!(degradation_rate(80.0, 50.0), 0.04, epsilon = 1e-12);
        assert_relative_eq!(degradation_rate(80.0, 25.0), 0.02, epsilon = 1e-12);
        assert_relative_eq!(degradation_rate(80.0, 5.0), 0.024, epsilon = 1e-12);
        assert_relative_eq!(degradation_rate(100.0, 70.0), 0.0);
    }

    #[test]
    fn test_too_few_readings() {
        let mut history = History::new(10);
        for _ in 0..4 {
            history.push(entry(10.0, 25.0, 90.0));
        }
        assert!(predict(&history, &BatterySpecs::default()).is_zero());
        assert!(predict(&History::new(10), &BatterySpecs::default()).is_zero());
    }

    #[test]
    fn test_zero_current_gives_zero_life() {
        let mut history = History::new(10);
        for _ in 0..6 {
            history.push(entry(0.0, 25.0, 90.0));
        }
        let prediction = predict(&history, &BatterySpecs::default());
        assert_eq!(prediction.remaining_life_hours, 0.0);
        assert_eq!(prediction.remaining_cycles, 1000.0);
    }

    #[test]
    fn test_discharge_current_counts_by_magnitude() {
        let mut history = History::new(10);
        for i in 0..6 {
            let current = if i % 2 == 0 { -20.0 } else { 20.0 };
            history.push(entry(current, 25.0, 90.0).with_capacity(50.0));
        }
        let prediction = predict(&history, &BatterySpecs::default());
        // 50% of 100 Ah at 20 A
        assert_relative_eq!(prediction.remaining_life_hours, 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_cycles_floor_at_zero() {
        let mut history = History::new(10);
        for _ in 0..5 {
            history.push(entry(10.0, 25.0, 60.0).with_cycles(1500));
        }
        let prediction = predict(&history, &BatterySpecs::default());
        assert_eq!(prediction.remaining_cycles, 0.0);
    }

    #[test]
    fn test_strategy_matches_free_function() {
        let mut history = History::new(10);
        for _ in 0..8 {
            history.push(entry(15.0, 48.0, 78.0));
        }
        let specs = BatterySpecs::default();
        let estimate = AnalyticalStrategy::new().predict(&history, &specs).unwrap();
        assert_eq!(estimate.prediction, predict(&history, &specs));
        assert_eq!(estimate.confidence, ANALYTICAL_CONFIDENCE);
        assert_eq!(estimate.recommendations.len(), 2);
    }

    #[test]
    fn test_strategy_and_free_function_share_gate() {
        let specs = BatterySpecs::default();
        let mut history = History::new(10);
        for n in 1..=MIN_ANALYTICAL_READINGS {
            history.push(entry(15.0, 25.0, 90.0));
            let estimate = AnalyticalStrategy.predict(&history, &specs).unwrap();
            let direct = predict(&history, &specs);
            assert_eq!(estimate.prediction, direct);
            assert_eq!(direct.is_zero(), n < MIN_ANALYTICAL_READINGS);
        }
    }
}
