//! Per-client circuit breaker: Closed/Open/HalfOpen with exponential backoff on repeated trips.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Tunables for one breaker instance, resolved from [`LmClientConfig`](crate::lm::LmClientConfig).
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub reset_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Whether a caller may proceed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Probe,
    Blocked,
}

/// A single client's breaker. Not `Send`-shared directly — callers wrap it in a
/// `tokio::sync::Mutex` so writes serialize, matching the single-writer-at-a-time
/// contract for shared client state.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitState,
    failure_timestamps: Vec<Instant>,
    opened_at: Option<Instant>,
    consecutive_opens: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_timestamps: Vec::new(),
            opened_at: None,
            consecutive_opens: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn current_open_duration(&self) -> Duration {
        let multiplier = self.config.backoff_factor.powi(self.consecutive_opens.saturating_sub(1) as i32);
        self.config.backoff_base.mul_f64(multiplier).max(self.config.reset_timeout)
    }

    /// Call before dispatching a request. `Blocked` means fail fast with `CircuitOpen`
    /// without touching the transport; `Probe` means this is the one allowed half-open
    /// test request.
    pub fn admit(&mut self) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.current_open_duration() {
                    self.state = CircuitState::HalfOpen;
                    info!(event = "breaker_transition", from = "open", to = "half_open");
                    Admission::Probe
                } else {
                    Admission::Blocked
                }
            }
            CircuitState::HalfOpen => Admission::Probe,
        }
    }

    /// Call after a request completes. `counted_failure` comes from
    /// `ClientError::counts_as_breaker_failure`; successes never count as failures,
    /// and `CircuitOpen` outcomes must never reach this method at all.
    pub fn record(&mut self, counted_failure: bool) {
        let now = Instant::now();
        match (self.state, counted_failure) {
            (CircuitState::HalfOpen, false) => {
                self.state = CircuitState::Closed;
                self.failure_timestamps.clear();
                self.opened_at = None;
                self.consecutive_opens = 0;
                info!(event = "breaker_transition", from = "half_open", to = "closed");
            }
            (CircuitState::HalfOpen, true) => {
                self.open(now);
                warn!(event = "breaker_transition", from = "half_open", to = "open");
            }
            (CircuitState::Closed, true) => {
                self.failure_timestamps.push(now);
                let cutoff = now.checked_sub(self.config.window).unwrap_or(now);
                self.failure_timestamps.retain(|t| *t >= cutoff);
                if self.failure_timestamps.len() as u32 >= self.config.failure_threshold {
                    self.open(now);
                    warn!(event = "breaker_transition", from = "closed", to = "open");
                }
            }
            (CircuitState::Closed, false) => {
                self.failure_timestamps.clear();
            }
            (CircuitState::Open, _) => {
                // A probe in flight raced with a timeout-driven admit; ignore.
            }
        }
    }

    fn open(&mut self, at: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(at);
        self.consecutive_opens += 1;
        self.failure_timestamps.clear();
    }
}
