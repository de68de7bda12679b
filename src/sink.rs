// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Telemetry forwarding
//!
//! Accepted readings can be pushed to an HTTP backend. Delivery is best
//! effort: a failed delivery is retried per [`RetryStrategy`], then logged
//! and counted, and ingestion carries on.

use crate::classifier::Assessment;
use crate::error::SinkError;
use crate::protocol::{FrameProtocol, Reading, SourceTag};
use crate::recovery::{with_retry, RetryStrategy};
use crate::session::{Monitor, SessionObserver};
use serde::Serialize;
use tracing::{debug, warn};

/// JSON body sent for each reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub timestamp: f32,
    pub pack_voltage: f32,
    pub pack_current: f32,
    pub cell_temp: f32,
    pub source: String,
}

impl TelemetryPayload {
    /// Payload for a reading from `source`
    pub fn new(reading: &Reading, source: impl Into<String>) -> Self {
        Self {
            timestamp: reading.timestamp,
            pack_voltage: reading.pack_voltage,
            pack_current: reading.pack_current,
            cell_temp: reading.cell_temp,
            source: source.into(),
        }
    }
}

/// Destination for accepted telemetry
pub trait TelemetrySink {
    /// Deliver one payload
    fn deliver(&mut self, payload: &TelemetryPayload) -> Result<(), SinkError>;
}

/// Whether an HTTP status counts as delivered
pub fn is_delivered(status: u16) -> bool {
    matches!(status, 200 | 201)
}

#[cfg(feature = "http")]
pub use self::http::HttpSink;

#[cfg(feature = "http")]
mod http {
    use super::{is_delivered, TelemetryPayload, TelemetrySink};
    use crate::config::SinkConfig;
    use crate::error::SinkError;

    /// POSTs payloads as JSON to the configured endpoint
    pub struct HttpSink {
        agent: ureq::Agent,
        endpoint: String,
    }

    impl HttpSink {
        /// Create a sink for the given configuration
        pub fn new(config: &SinkConfig) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(config.timeout())
                .user_agent(concat!("packwatch/", env!("CARGO_PKG_VERSION")))
                .build();
            Self {
                agent,
                endpoint: config.endpoint(),
            }
        }

        /// Endpoint receiving the payloads
        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    impl TelemetrySink for HttpSink {
        fn deliver(&mut self, payload: &TelemetryPayload) -> Result<(), SinkError> {
            let body = serde_json::to_string(payload)
                .map_err(|e| SinkError::Serialization(e.to_string()))?;

            let response = self
                .agent
                .post(&self.endpoint)
                .set("Content-Type", "application/json")
                .send_string(&body);

            match response {
                Ok(resp) if is_delivered(resp.status()) => Ok(()),
                Ok(resp) => Err(SinkError::Rejected {
                    status: resp.status(),
                }),
                Err(ureq::Error::Status(status, _)) => Err(SinkError::Rejected { status }),
                Err(ureq::Error::Transport(e)) => Err(SinkError::Transport(e.to_string())),
            }
        }
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Session observer that forwards every accepted reading to a sink
pub struct ForwardingObserver<S> {
    sink: S,
    retry: RetryStrategy,
    source: String,
    protocol: FrameProtocol,
    stats: DeliveryStats,
}

impl<S: TelemetrySink> ForwardingObserver<S> {
    /// Forward to `sink`, reporting readings as coming from `source`
    pub fn new(sink: S, source: impl Into<String>, protocol: FrameProtocol) -> Self {
        Self {
            sink,
            retry: RetryStrategy::telemetry_default(),
            source: source.into(),
            protocol,
            stats: DeliveryStats::default(),
        }
    }

    /// Replace the retry strategy
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Source string for a tagged reading
    ///
    /// Single-reading connections report the bare source; batch frames
    /// append their tag.
    pub fn source_for(&self, tag: SourceTag) -> String {
        match self.protocol {
            FrameProtocol::SingleReading => self.source.clone(),
            FrameProtocol::ModuleBatch { .. } => format!("{}/{}", self.source, tag),
        }
    }

    /// Forward one reading
    pub fn forward(&mut self, tag: SourceTag, reading: &Reading) -> Result<(), SinkError> {
        let payload = TelemetryPayload::new(reading, self.source_for(tag));
        let sink = &mut self.sink;
        let result = with_retry(&self.retry, || sink.deliver(&payload));
        match &result {
            Ok(()) => {
                self.stats.delivered += 1;
                debug!("Forwarded {} reading at t={}", payload.source, payload.timestamp);
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("Failed to forward {} reading: {}", payload.source, e);
            }
        }
        result
    }

    /// Delivery counters so far
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// The wrapped sink
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: TelemetrySink> SessionObserver for ForwardingObserver<S> {
    fn on_reading(
        &mut self,
        tag: SourceTag,
        reading: &Reading,
        _assessment: &Assessment,
        _monitor: &Monitor,
    ) {
        // Failures are already logged and counted
        let _ = self.forward(tag, reading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct FlakySink {
        failures_left: u32,
        received: Vec<TelemetryPayload>,
    }

    impl TelemetrySink for FlakySink {
        fn deliver(&mut self, payload: &TelemetryPayload) -> Result<(), SinkError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(SinkError::Rejected { status: 503 });
            }
            self.received.push(payload.clone());
            Ok(())
        }
    }

    #[test]
    fn test_payload_json() {
        let payload = TelemetryPayload::new(&Reading::new(1.0, 3.5, -2.0, 30.0), "packwatch");
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["pack_voltage"], 3.5);
        assert_eq!(json["pack_current"], -2.0);
        assert_eq!(json["source"], "packwatch");
    }

    #[test]
    fn test_delivered_statuses() {
        assert!(is_delivered(200));
        assert!(is_delivered(201));
        assert!(!is_delivered(202));
        assert!(!is_delivered(500));
    }

    #[test]
    fn test_retry_recovers() {
        let sink = FlakySink {
            failures_left: 1,
            ..Default::default()
        };
        let mut forwarder = ForwardingObserver::new(sink, "pack-a", FrameProtocol::SingleReading)
            .with_retry(RetryStrategy::fixed(1, Duration::from_millis(1)));

        assert!(forwarder
            .forward(SourceTag::Pack, &Reading::new(0.0, 3.7, 1.0, 25.0))
            .is_ok());
        assert_eq!(forwarder.stats().delivered, 1);
        assert_eq!(forwarder.sink().received[0].source, "pack-a");
    }

    #[test]
    fn test_failure_counted_not_fatal() {
        let sink = FlakySink {
            failures_left: 10,
            ..Default::default()
        };
        let mut forwarder = ForwardingObserver::new(sink, "pack-a", FrameProtocol::SingleReading)
            .with_retry(RetryStrategy::None);

        let result = forwarder.forward(SourceTag::Pack, &Reading::new(0.0, 3.7, 1.0, 25.0));
        assert_eq!(result, Err(SinkError::Rejected { status: 503 }));
        assert_eq!(
            forwarder.stats(),
            DeliveryStats {
                delivered: 0,
                failed: 1
            }
        );
    }

    #[test]
    fn test_batch_source_tags() {
        let forwarder =
            ForwardingObserver::new(FlakySink::default(), "rack7", FrameProtocol::module_batch());
        assert_eq!(forwarder.source_for(SourceTag::Module), "rack7/module");
        assert_eq!(forwarder.source_for(SourceTag::SubPack(2)), "rack7/battery_2");
    }
}
