// Packwatch Monitor - Battery telemetry monitor daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Packwatch Monitor
//!
//! Receives battery telemetry frames over TCP, shows a live dashboard and
//! optionally forwards readings to an HTTP backend.
//!
//! ## Usage
//!
//! ```bash
//! # Listen on the default port
//! packwatch-monitor listen
//!
//! # Module batches, forwarding to a backend
//! packwatch-monitor listen --protocol module_batch --backend-url http://localhost:8000
//!
//! # Predict battery life from a recorded history
//! packwatch-monitor predict history.json --specs battery_specs.json
//! ```

mod dashboard;
mod logging;
mod predict;

use clap::{Parser, Subcommand};
use dashboard::Dashboard;
use packwatch::{
    ForwardingObserver, FrameProtocol, HttpSink, Listener, Monitor, MonitorConfig,
    PackwatchError, SinkConfig,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Battery pack telemetry monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file (appended)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive telemetry frames and display them
    Listen {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,

        /// Frame protocol (single, module_batch, batch:N)
        #[arg(long)]
        protocol: Option<FrameProtocol>,

        /// Forward accepted readings to this backend
        #[arg(long, env = "PACKWATCH_BACKEND_URL")]
        backend_url: Option<String>,

        /// Source name reported to the backend
        #[arg(long)]
        source: Option<String>,

        /// Do not draw the dashboard
        #[arg(short, long)]
        quiet: bool,
    },

    /// Predict battery life from a JSON history file
    Predict {
        /// JSON array of extended readings
        input: PathBuf,

        /// Battery specifications file
        #[arg(long, default_value = "battery_specs.json")]
        specs: PathBuf,

        /// Generative backend API key, enables the external strategy
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Generative backend endpoint
        #[arg(long)]
        api_url: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Monitor(#[from] PackwatchError),

    #[error(transparent)]
    History(#[from] predict::HistoryFileError),

    #[error("Failed to install interrupt handler: {0}")]
    Signal(std::io::Error),
}

/// Cancel `token` on Ctrl-C
fn watch_interrupt(token: CancellationToken) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Signal)?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => info!("Interrupt received, shutting down"),
                        Err(e) => error!("Interrupt handler failed: {}", e),
                    },
                    _ = token.cancelled() => return,
                }
                token.cancel();
            });
        })
        .map_err(CliError::Signal)?;
    Ok(())
}

fn listen_config(
    config: Option<PathBuf>,
    port: Option<u16>,
    protocol: Option<FrameProtocol>,
    backend_url: Option<String>,
    source: Option<String>,
) -> Result<MonitorConfig, PackwatchError> {
    let mut cfg = match config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(protocol) = protocol {
        cfg.protocol = protocol;
    }
    if let Some(url) = backend_url {
        cfg.sink = Some(SinkConfig::new(url));
    }
    if let (Some(sink), Some(source)) = (cfg.sink.as_mut(), source) {
        sink.source = source;
    }
    Ok(cfg)
}

fn listen(cfg: &MonitorConfig, bind: IpAddr, quiet: bool) -> Result<(), CliError> {
    let addr = SocketAddr::new(bind, cfg.port);
    let listener = Listener::bind(addr, cfg.protocol, cfg.poll_interval())?;

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone())?;

    let forwarder = cfg.sink.as_ref().map(|sink| {
        info!("Forwarding readings to {}", sink.endpoint());
        ForwardingObserver::new(HttpSink::new(sink), sink.source.clone(), cfg.protocol)
    });
    let mut observer = (Dashboard::new(!quiet), forwarder);
    let mut monitor = Monitor::from_config(cfg);

    let totals = listener.serve(&mut monitor, &mut observer, &cancel);

    if let Some(forwarder) = &observer.1 {
        let delivery = forwarder.stats();
        info!(
            "Forwarded {} readings, {} failed",
            delivery.delivered, delivery.failed
        );
    }
    info!(
        "Served {} sessions, {} frames",
        totals.sessions, totals.frames
    );
    println!("{}", monitor.stats().report());
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Listen {
            config,
            port,
            bind,
            protocol,
            backend_url,
            source,
            quiet,
        } => {
            let cfg = listen_config(config, port, protocol, backend_url, source)?;
            let log_file = args.log_file.unwrap_or_else(|| cfg.log_file.clone());
            logging::init(&log_file, &args.log_level);
            listen(&cfg, bind, quiet)
        }
        Command::Predict {
            input,
            specs,
            api_key,
            api_url,
        } => {
            let log_file = args
                .log_file
                .unwrap_or_else(|| PathBuf::from(packwatch::config::DEFAULT_LOG_FILE));
            logging::init(&log_file, &args.log_level);
            let report = predict::run(&predict::PredictOptions {
                input,
                specs,
                api_key,
                api_url,
            })?;
            print!("{}", report);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_listen() {
        let args = Args::try_parse_from([
            "packwatch-monitor",
            "--log-level",
            "debug",
            "listen",
            "--port",
            "9000",
            "--protocol",
            "batch:3",
            "--quiet",
        ])
        .unwrap();

        assert_eq!(args.log_level, "debug");
        match args.command {
            Command::Listen {
                port,
                protocol,
                quiet,
                ..
            } => {
                assert_eq!(port, Some(9000));
                assert_eq!(protocol, Some(FrameProtocol::ModuleBatch { frames: 3 }));
                assert!(quiet);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_protocol() {
        let result = Args::try_parse_from(["packwatch-monitor", "listen", "--protocol", "udp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cfg = listen_config(
            None,
            Some(4000),
            Some(FrameProtocol::module_batch()),
            Some("http://localhost:8000".to_string()),
            Some("bench-pack".to_string()),
        )
        .unwrap();

        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.protocol, FrameProtocol::module_batch());
        let sink = cfg.sink.unwrap();
        assert_eq!(sink.url, "http://localhost:8000");
        assert_eq!(sink.source, "bench-pack");
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = listen_config(
            Some(PathBuf::from("/nonexistent/packwatch.json")),
            None,
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(PackwatchError::Config(_))));
    }
}
