// Packwatch Monitor - Battery telemetry monitor daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Log output: `"<timestamp> [LEVEL] <message>"` lines on stderr and in an
//! append-only log file.

use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{warn, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Level name as written in the log
pub fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        _ => "INFO",
    }
}

/// One plain line per event, no ANSI colouring
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} [{}] ",
            Local::now().format("%a %b %e %H:%M:%S %Y"),
            level_label(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter from `RUST_LOG`, else from the CLI level
pub fn filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    })
}

/// Install the global subscriber
///
/// If the log file cannot be opened, logging continues on stderr only.
pub fn init(log_file: &Path, log_level: &str) {
    let opened = OpenOptions::new().create(true).append(true).open(log_file);
    let (writer, open_error) = match opened {
        Ok(file) => (BoxMakeWriter::new(std::io::stderr.and(Arc::new(file))), None),
        Err(e) => (BoxMakeWriter::new(std::io::stderr), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter(log_level))
        .event_format(LineFormat)
        .with_writer(writer)
        .init();

    if let Some(e) = open_error {
        warn!("Could not open log file {}: {}", log_file.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(level_label(&Level::ERROR), "ERROR");
        assert_eq!(level_label(&Level::WARN), "WARNING");
        assert_eq!(level_label(&Level::INFO), "INFO");
        assert_eq!(level_label(&Level::DEBUG), "INFO");
    }

    #[test]
    fn test_line_format() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(LineFormat)
            .with_writer(move || sink.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("ALERT: Low voltage (2.00V)");
            tracing::info!("Client connected from 127.0.0.1:5000");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [WARNING] ALERT: Low voltage (2.00V)"));
        assert!(lines[1].ends_with(" [INFO] Client connected from 127.0.0.1:5000"));
        assert!(!output.contains('\u{1b}'));
    }
}
