// Packwatch Testdata - Telemetry scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic pack telemetry scenarios.
//!
//! Every scenario except [`Scenario::Random`] is a closed-form function of
//! the elapsed time in seconds, so the same `t` always yields the same
//! reading. Trend scenarios are shaped for a 30 second run.

use packwatch::Reading;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length the trend scenarios are shaped for, in seconds
pub const SCENARIO_SECONDS: f32 = 30.0;

/// Named telemetry scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Stable voltage, small current and temperature swings
    #[default]
    Normal,
    /// Voltage rising under positive current
    Charging,
    /// Voltage falling under negative current
    Discharging,
    /// Temperature climbing to 65 °C
    Overheating,
    /// Voltage sagging to 2.7 V
    VoltageAnomaly,
    /// Normally distributed readings, clamped to a healthy range
    Random,
}

impl Scenario {
    /// All scenarios, in CLI order
    pub const ALL: [Scenario; 6] = [
        Scenario::Normal,
        Scenario::Charging,
        Scenario::Discharging,
        Scenario::Overheating,
        Scenario::VoltageAnomaly,
        Scenario::Random,
    ];

    /// Scenario name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Charging => "charging",
            Scenario::Discharging => "discharging",
            Scenario::Overheating => "overheating",
            Scenario::VoltageAnomaly => "voltage_anomaly",
            Scenario::Random => "random",
        }
    }

    /// Reading `t` seconds into the scenario
    pub fn reading_at<R: Rng + ?Sized>(&self, t: f32, rng: &mut R) -> Reading {
        let progress = t / SCENARIO_SECONDS;
        let (voltage, current, temp) = match self {
            Scenario::Normal => (
                3.7 + 0.1 * (t * 0.1).sin(),
                1.0 + 0.5 * (t * 0.2).sin(),
                25.0 + 2.0 * (t * 0.15).sin(),
            ),
            Scenario::Charging => (
                3.5 + 0.6 * progress,
                3.0 + (t * 0.3).sin(),
                25.0 + 5.0 * progress,
            ),
            Scenario::Discharging => (
                4.0 - 0.8 * progress,
                -2.0 - (t * 0.3).sin(),
                25.0 + 3.0 * progress,
            ),
            Scenario::Overheating => (
                3.7 + 0.1 * (t * 0.1).sin(),
                2.0 + 0.5 * (t * 0.2).sin(),
                25.0 + 40.0 * progress,
            ),
            Scenario::VoltageAnomaly => (
                3.7 - progress,
                1.0 + 0.5 * (t * 0.2).sin(),
                25.0 + 2.0 * (t * 0.15).sin(),
            ),
            Scenario::Random => return random_reading(t, rng),
        };
        Reading::new(t, voltage, current, temp)
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, mean: f32, std: f32, min: f32, max: f32) -> f32 {
    match Normal::new(mean, std) {
        Ok(dist) => dist.sample(rng).clamp(min, max),
        Err(_) => mean,
    }
}

fn random_reading<R: Rng + ?Sized>(t: f32, rng: &mut R) -> Reading {
    Reading::new(
        t,
        sample(rng, 3.7, 0.1, 3.0, 4.2),
        sample(rng, 2.0, 1.0, -10.0, 10.0),
        sample(rng, 25.0, 5.0, 15.0, 35.0),
    )
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name() == s.to_lowercase())
            .ok_or_else(|| {
                let names: Vec<_> = Scenario::ALL.iter().map(Scenario::name).collect();
                format!("unknown scenario '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Reproducible stream of readings for one scenario
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    scenario: Scenario,
    rng: StdRng,
}

impl ScenarioGenerator {
    /// Generator seeded from entropy
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            rng: StdRng::from_entropy(),
        }
    }

    /// Generator with a fixed seed
    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Reading at `t` seconds
    pub fn reading_at(&mut self, t: f32) -> Reading {
        self.scenario.reading_at(t, &mut self.rng)
    }

    /// Module reading plus `sub_packs` per-pack readings at `t` seconds
    ///
    /// Sub-pack readings share the module's current and spread voltage
    /// and temperature slightly around it.
    pub fn group_at(&mut self, t: f32, sub_packs: usize) -> Vec<Reading> {
        let module = self.reading_at(t);
        let mut group = Vec::with_capacity(sub_packs + 1);
        group.push(module);
        for _ in 0..sub_packs {
            let voltage = sample(
                &mut self.rng,
                module.pack_voltage,
                0.01,
                0.0,
                f32::MAX,
            );
            let temp = sample(&mut self.rng, module.cell_temp, 0.5, -100.0, 200.0);
            group.push(Reading::new(t, voltage, module.pack_current, temp));
        }
        group
    }

    /// `count` readings spaced `step` seconds apart, starting at zero
    pub fn series(&mut self, count: usize, step: f32) -> Vec<Reading> {
        (0..count).map(|i| self.reading_at(i as f32 * step)).collect()
    }
}
