// Packwatch Monitor - Battery telemetry monitor daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Terminal dashboard redrawn on every accepted reading.

use packwatch::{
    Assessment, FieldStatus, Monitor, Reading, SessionObserver, SessionSummary, Severity,
    SourceTag, ValidationError,
};
use std::io::{self, Write};

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const CLEAR: &str = "\x1b[2J\x1b[1;1H";

/// Readings listed under "Recent"
const RECENT_ROWS: usize = 5;

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => GREEN,
        Severity::Warning => YELLOW,
        Severity::Critical | Severity::Error => RED,
    }
}

fn status_color(status: FieldStatus) -> &'static str {
    match status {
        FieldStatus::Normal => GREEN,
        FieldStatus::Warning => YELLOW,
        FieldStatus::Critical => RED,
    }
}

/// Render the dashboard for one reading
pub fn render(
    tag: SourceTag,
    reading: &Reading,
    assessment: &Assessment,
    monitor: &Monitor,
) -> String {
    let fields = monitor.classifier().field_status(reading);
    let stats = monitor.stats();
    let mut out = String::new();

    out.push_str("=== Battery Monitor Dashboard ===\n");
    out.push_str(&format!("Source: {}\n", tag));
    out.push_str(&format!("Timestamp: {:.1}s\n", reading.timestamp));
    out.push_str(&format!(
        "Voltage:     {}{:>8.3} V{}\n",
        status_color(fields.voltage),
        reading.pack_voltage,
        RESET
    ));
    out.push_str(&format!(
        "Current:     {}{:>8.3} A{}\n",
        status_color(fields.current),
        reading.pack_current,
        RESET
    ));
    out.push_str(&format!(
        "Temperature: {}{:>8.2} °C{}\n",
        status_color(fields.temperature),
        reading.cell_temp,
        RESET
    ));
    out.push_str(&format!(
        "Status: {}{}{}\n",
        severity_color(assessment.severity),
        assessment.severity,
        RESET
    ));
    if let Some(message) = assessment.message() {
        out.push_str(&format!("{}{}{}\n", RED, message, RESET));
    }

    out.push_str(&format!(
        "\nPackets: {} total, {} valid, {} errors ({:.1}% ok)\n",
        stats.total_count,
        stats.valid_count,
        stats.error_count,
        stats.success_rate()
    ));

    out.push_str("\nRecent readings:\n");
    for recent in monitor.history().last_n(RECENT_ROWS) {
        out.push_str(&format!(
            "  t={:>8.1}s  V={:>7.3}  I={:>8.3}  T={:>6.2}\n",
            recent.timestamp, recent.pack_voltage, recent.pack_current, recent.cell_temp
        ));
    }
    out
}

/// Session observer printing the dashboard to stdout
pub struct Dashboard {
    enabled: bool,
}

impl Dashboard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn print(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout must not stop ingestion
        let _ = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush());
    }
}

impl SessionObserver for Dashboard {
    fn on_reading(
        &mut self,
        tag: SourceTag,
        reading: &Reading,
        assessment: &Assessment,
        monitor: &Monitor,
    ) {
        if self.enabled {
            self.print(&format!("{}{}", CLEAR, render(tag, reading, assessment, monitor)));
        }
    }

    fn on_rejected(&mut self, tag: SourceTag, _reading: &Reading, error: &ValidationError) {
        if self.enabled {
            self.print(&format!(
                "{}[{}] invalid packet from {}: {}{}\n",
                RED,
                Severity::Error,
                tag,
                error,
                RESET
            ));
        }
    }

    fn on_session_end(&mut self, summary: &SessionSummary) {
        if self.enabled {
            self.print(&format!(
                "Session closed: {} frames, {} accepted, {} rejected\n",
                summary.frames, summary.accepted, summary.rejected
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_alert() {
        let mut monitor = Monitor::default();
        for i in 0..7 {
            monitor
                .ingest(Reading::new(i as f32, 3.7, 1.0, 25.0))
                .unwrap();
        }
        let reading = Reading::new(7.0, 2.5, 1.0, 25.0);
        let assessment = monitor.ingest(reading).unwrap();

        let text = render(SourceTag::Pack, &reading, &assessment, &monitor);

        assert!(text.contains("Source: pack"));
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("ALERT: Low voltage (2.50V)"));
        assert!(text.contains("Packets: 8 total, 8 valid, 0 errors"));
        assert_eq!(text.matches("  t=").count(), RECENT_ROWS);
    }
}
