// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Recovery helpers for outbound calls
//!
//! The telemetry sink retries failed deliveries with a [`RetryStrategy`];
//! the external prediction service sits behind a [`CircuitBreaker`] so a
//! dead endpoint does not cost a full timeout on every prediction.

use std::time::{Duration, Instant};
use tracing::debug;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Calls go through
    #[default]
    Closed,
    /// Calls are refused until the recovery timeout passes
    Open,
    /// One trial call decides whether the service is back
    HalfOpen,
}

/// Circuit breaker tuning
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Consecutive service failures that open the circuit
    pub failure_threshold: u32,
    /// Successful trial calls that close it again
    pub success_threshold: u32,
    /// How long an open circuit refuses calls
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Guards calls to an unreliable remote service
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
    config: CircuitConfig,
}

impl CircuitBreaker {
    /// Closed breaker with the default tuning
    pub fn new() -> Self {
        Self::with_config(CircuitConfig::default())
    }

    /// Closed breaker with custom tuning
    pub fn with_config(config: CircuitConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            opened_at: None,
            config,
        }
    }

    /// Whether the next call may go out
    ///
    /// An open circuit turns half-open once its recovery timeout has passed.
    pub fn should_allow(&mut self) -> bool {
        if self.state != CircuitState::Open {
            return true;
        }
        let cooled = self
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
        if cooled {
            self.state = CircuitState::HalfOpen;
            self.trial_successes = 0;
        }
        cooled
    }

    /// The service answered
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                self.trial_successes += 1;
                if self.trial_successes >= self.config.success_threshold {
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// The service could not be reached
    pub fn record_failure(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.trip();
                }
            }
            CircuitState::HalfOpen => self.trip(),
            CircuitState::Open => {}
        }
    }

    fn trip(&mut self) {
        debug!("Circuit opened for {:?}", self.config.recovery_timeout);
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// How often a failed delivery is repeated
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryStrategy {
    /// Give up after the first failure
    #[default]
    None,
    /// Retry up to `max_retries` times, waiting `delay` before each
    Fixed { max_retries: u32, delay: Duration },
}

impl RetryStrategy {
    /// Fixed retry count and delay
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::Fixed { max_retries, delay }
    }

    /// One retry after 100 ms, the sink default
    pub fn telemetry_default() -> Self {
        Self::fixed(1, Duration::from_millis(100))
    }

    /// Wait before retry number `attempt` (0-indexed), None once exhausted
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed { max_retries, delay } => (attempt < *max_retries).then_some(*delay),
        }
    }
}

/// Run `operation`, retrying failures as `strategy` allows
///
/// Returns the last error once retries are exhausted.
pub fn with_retry<T, E, F>(strategy: &RetryStrategy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        let error = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        let Some(delay) = strategy.delay_for_attempt(attempt) else {
            return Err(error);
        };
        debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, error, delay);
        std::thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(failure_threshold: u32, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitConfig {
            failure_threshold,
            success_threshold,
            recovery_timeout: Duration::from_millis(10),
        })
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let mut cb = CircuitBreaker::new();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn test_success_clears_failure_streak() {
        let mut cb = CircuitBreaker::new();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_trials_close_circuit() {
        let mut cb = quick(1, 2);
        cb.record_failure();
        assert!(!cb.should_allow());

        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.should_allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut cb = quick(1, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.should_allow());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn test_retry_delays() {
        let fixed = RetryStrategy::fixed(2, Duration::from_millis(100));
        assert_eq!(fixed.delay_for_attempt(0), Some(Duration::from_millis(100)));
        assert_eq!(fixed.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(fixed.delay_for_attempt(2), None);
        assert_eq!(RetryStrategy::None.delay_for_attempt(0), None);
        assert_eq!(
            RetryStrategy::telemetry_default().delay_for_attempt(1),
            None
        );
    }

    #[test]
    fn test_with_retry_succeeds_after_failure() {
        let strategy = RetryStrategy::fixed(1, Duration::from_millis(1));
        let mut calls = 0;
        let result = with_retry(&strategy, || {
            calls += 1;
            if calls < 2 {
                Err("busy")
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn test_with_retry_gives_up() {
        let strategy = RetryStrategy::fixed(2, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<(), &str> = with_retry(&strategy, || {
            calls += 1;
            Err("down")
        });
        assert_eq!(result, Err("down"));
        assert_eq!(calls, 3);
    }
}
