// Packwatch Testdata - Telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Streams a telemetry scenario to a monitor, or writes a degradation
//! history for `packwatch-monitor predict`.
//!
//! ```bash
//! packwatch-sim stream --scenario overheating
//! packwatch-sim stream --protocol module_batch --duration 60 --interval-ms 200
//! packwatch-sim degradation --count 50 --output history.json
//! ```

use clap::{Parser, Subcommand};
use packwatch::config::DEFAULT_PORT;
use packwatch::FrameProtocol;
use packwatch_testdata::{DegradationSeries, Scenario, ScenarioGenerator, StreamPlan, TestClient};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Battery telemetry simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a scenario to a monitor
    Stream {
        /// Monitor address
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,

        /// Monitor port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Scenario (normal, charging, discharging, overheating, voltage_anomaly, random)
        #[arg(short, long, default_value = "normal")]
        scenario: Scenario,

        /// Frame protocol (single, module_batch, batch:N)
        #[arg(long, default_value = "single")]
        protocol: FrameProtocol,

        /// Scenario seconds to cover
        #[arg(short, long, default_value = "30")]
        duration: f32,

        /// Wall-clock milliseconds between groups
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Seed for the random scenario
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write a degradation history as JSON
    Degradation {
        /// Number of hourly readings
        #[arg(short, long, default_value = "20")]
        count: usize,

        /// Output file
        #[arg(short, long, default_value = "battery_history.json")]
        output: PathBuf,
    },
}

fn stream(
    addr: SocketAddr,
    scenario: Scenario,
    protocol: FrameProtocol,
    plan: StreamPlan,
    seed: Option<u64>,
) -> Result<(), packwatch_testdata::ClientError> {
    println!("=== Battery Monitor Test Client ===");
    println!("Server: {}", addr);

    let mut client = TestClient::connect(addr, protocol)?;
    println!(
        "Running {} scenario for {} seconds ({} frames)...",
        scenario, plan.duration_secs, protocol
    );

    let mut generator = match seed {
        Some(seed) => ScenarioGenerator::with_seed(scenario, seed),
        None => ScenarioGenerator::new(scenario),
    };
    let frames = client.stream(&mut generator, &plan, |group| {
        for reading in group {
            println!(
                "Sent: T={:.2}s, V={:.2}V, I={:.2}A, Temp={:.2}°C",
                reading.timestamp, reading.pack_voltage, reading.pack_current, reading.cell_temp
            );
        }
    })?;

    println!("Scenario completed, {} frames sent.", frames);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = match args.command {
        Command::Stream {
            ip,
            port,
            scenario,
            protocol,
            duration,
            interval_ms,
            seed,
        } => {
            let plan = StreamPlan {
                duration_secs: duration,
                step_secs: 1.0,
                pause: Duration::from_millis(interval_ms),
            };
            stream(SocketAddr::new(ip, port), scenario, protocol, plan, seed)
                .map_err(|e| e.to_string())
        }
        Command::Degradation { count, output } => DegradationSeries::new(count)
            .to_json_file(&output)
            .map(|_| println!("Wrote {} readings to {}", count, output.display()))
            .map_err(|e| format!("Cannot write {}: {}", output.display(), e)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
