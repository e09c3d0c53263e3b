//! Network poll loop
//!
//! Drives the engine: build a request, await the response, ingest it, pick
//! the next delay, sleep, repeat.
//!
//! ```text
//!   Idle ──▶ Requesting ──▶ Succeeded ──▶ Idle  (cadence from server_fps / RTT)
//!                      └──▶ Failed    ──▶ Idle  (exponential backoff)
//! ```
//!
//! Exactly one request is in flight at a time. Cancellation is cooperative:
//! the mounted flag in [`PollHandle`] is checked before every iteration and
//! again before acting on a completed request, so a stop takes effect once
//! the in-flight request resolves.

use crate::engine::SharedEngine;
use crate::events::{EventBus, NetEvent};
use crate::transport::PollTransport;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use slipstream_core::{Clock, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Floor on the delay between successful polls
pub const MIN_POLL_INTERVAL_MS: u64 = 150;
/// Server rate assumed when the response carries no hint
pub const DEFAULT_SERVER_FPS: f64 = 10.0;
/// First backoff step after a failure
pub const BACKOFF_BASE_MS: u64 = 250;
/// Ceiling on any backoff step
pub const BACKOFF_MAX_MS: u64 = 5000;

/// Tunables for `PollLoop`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub min_interval_ms: u64,
    pub min_server_fps: f64,
    pub max_server_fps: f64,
    pub default_server_fps: f64,
    /// Above this smoothed RTT, polls are at least `slow_interval_ms` apart
    pub slow_rtt_ms: f64,
    pub slow_interval_ms: u64,
    /// Above this smoothed RTT, polls are at least `very_slow_interval_ms` apart
    pub very_slow_rtt_ms: f64,
    pub very_slow_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_max_exponent: u32,
    pub max_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: MIN_POLL_INTERVAL_MS,
            min_server_fps: 6.0,
            max_server_fps: 30.0,
            default_server_fps: DEFAULT_SERVER_FPS,
            slow_rtt_ms: 200.0,
            slow_interval_ms: 200,
            very_slow_rtt_ms: 500.0,
            very_slow_interval_ms: 500,
            backoff_base_ms: BACKOFF_BASE_MS,
            backoff_max_ms: BACKOFF_MAX_MS,
            backoff_max_exponent: 8,
            max_failures: 10,
        }
    }
}

impl PollConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.min_server_fps > 0.0 && self.min_server_fps <= self.max_server_fps) {
            return Err(Error::Config(format!(
                "poll server fps bounds invalid: [{}, {}]",
                self.min_server_fps, self.max_server_fps
            )));
        }
        if !(self.default_server_fps > 0.0 && self.default_server_fps.is_finite()) {
            return Err(Error::Config("poll.default_server_fps must be positive".to_string()));
        }
        if self.backoff_max_exponent > 32 {
            return Err(Error::Config("poll.backoff_max_exponent must be at most 32".to_string()));
        }
        if self.slow_rtt_ms > self.very_slow_rtt_ms {
            return Err(Error::Config(format!(
                "poll.slow_rtt_ms ({}) exceeds poll.very_slow_rtt_ms ({})",
                self.slow_rtt_ms, self.very_slow_rtt_ms
            )));
        }
        Ok(())
    }

    /// Delay before the next poll after a success
    ///
    /// `round(1000 / clamp(fps))`, floored at `min_interval_ms`, then widened
    /// when the smoothed RTT is high.
    pub fn next_poll_delay(&self, server_fps: Option<f64>, smoothed_rtt_ms: Option<f64>) -> u64 {
        let fps = server_fps
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(self.default_server_fps)
            .clamp(self.min_server_fps, self.max_server_fps);
        let mut delay = ((1000.0 / fps).round() as u64).max(self.min_interval_ms);

        if let Some(rtt) = smoothed_rtt_ms {
            if rtt > self.slow_rtt_ms {
                delay = delay.max(self.slow_interval_ms);
            }
            if rtt > self.very_slow_rtt_ms {
                delay = delay.max(self.very_slow_interval_ms);
            }
        }
        delay
    }

    /// Delay before retrying after `failures` consecutive failures
    pub fn backoff_delay(&self, failures: u32) -> u64 {
        let exponent = failures.min(self.backoff_max_exponent);
        self.backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms)
    }
}

/// Cooperative cancellation flag shared with a running poll loop
#[derive(Debug, Clone)]
pub struct PollHandle {
    mounted: Arc<AtomicBool>,
}

impl PollHandle {
    /// Create a handle in the mounted state
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Ask the loop to exit after its current request resolves
    pub fn stop(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    /// Check if the loop should keep running
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

impl Default for PollHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Succeeded,
    Failed,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Response ingested; poll again after `delay_ms`
    Success { delay_ms: u64 },
    /// Request failed; retry after `delay_ms`
    Failure { delay_ms: u64 },
    /// The handle was stopped while the request was in flight
    Cancelled,
}

/// Clock reading tokio's time source, so paused test time is respected
#[derive(Debug, Clone)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock that starts counting at zero
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Timestamp {
        self.start.elapsed().as_millis() as u64
    }
}

/// Drives a `PollTransport` against a shared engine
pub struct PollLoop<T: PollTransport, C: Clock> {
    engine: SharedEngine,
    transport: T,
    clock: C,
    config: PollConfig,
    events: EventBus,
    handle: PollHandle,
    state: PollState,
    failures: u32,
    last_delay_ms: u64,
}

impl<T: PollTransport, C: Clock> PollLoop<T, C> {
    /// Create a poll loop using the engine's poll configuration
    pub fn new(engine: SharedEngine, transport: T, clock: C) -> Self {
        let (config, events) = {
            let guard = engine.read();
            (guard.config().poll.clone(), guard.events().clone())
        };
        Self {
            engine,
            transport,
            clock,
            config,
            events,
            handle: PollHandle::new(),
            state: PollState::Idle,
            failures: 0,
            last_delay_ms: 0,
        }
    }

    /// Share an existing cancellation handle
    pub fn with_handle(mut self, handle: PollHandle) -> Self {
        self.handle = handle;
        self
    }

    /// Handle for stopping the loop
    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }

    /// Consecutive failures, capped at `max_failures`
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay chosen after the most recent cycle
    pub fn last_delay_ms(&self) -> u64 {
        self.last_delay_ms
    }

    /// Current state
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Run one request/response cycle without sleeping
    pub async fn step(&mut self) -> PollOutcome {
        self.state = PollState::Requesting;
        let request = self.engine.read().build_request(self.clock.now_ms());

        let result = self.transport.poll(&request).await;

        if !self.handle.is_mounted() {
            self.state = PollState::Idle;
            return PollOutcome::Cancelled;
        }
        let received_at = self.clock.now_ms();

        match result {
            Ok(response) => {
                let (report, rtt, interpolation_delay_ms) = {
                    let mut engine = self.engine.write();
                    let report = engine.ingest(&response, received_at);
                    (report, engine.smoothed_rtt_ms(), engine.interpolation_delay_ms())
                };
                let delay_ms = self.config.next_poll_delay(response.server_fps, rtt);
                self.failures = 0;
                self.last_delay_ms = delay_ms;
                self.state = PollState::Succeeded;

                log::debug!(
                    "poll ok: {} entities, rtt {:?}ms, next in {}ms",
                    report.recorded.recorded,
                    report.rtt_ms,
                    delay_ms
                );
                self.events.publish(NetEvent::PollSucceeded {
                    rtt_ms: report.rtt_ms,
                    interpolation_delay_ms,
                    next_poll_ms: delay_ms,
                    entities: report.recorded.recorded,
                });
                PollOutcome::Success { delay_ms }
            }
            Err(e) => {
                let delay_ms = self.config.backoff_delay(self.failures);
                self.failures = (self.failures + 1).min(self.config.max_failures);
                self.last_delay_ms = delay_ms;
                self.state = PollState::Failed;

                log::warn!(
                    "poll failed ({} in a row), retrying in {}ms: {}",
                    self.failures,
                    delay_ms,
                    e
                );
                self.events.publish(NetEvent::PollFailed {
                    failures: self.failures,
                    retry_in_ms: delay_ms,
                    reason: e.to_string(),
                });
                PollOutcome::Failure { delay_ms }
            }
        }
    }

    /// Poll until the handle is stopped
    pub async fn run(mut self) {
        log::info!("poll loop started");
        while self.handle.is_mounted() {
            let delay_ms = match self.step().await {
                PollOutcome::Success { delay_ms } | PollOutcome::Failure { delay_ms } => delay_ms,
                PollOutcome::Cancelled => break,
            };
            self.state = PollState::Idle;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        self.state = PollState::Idle;
        log::info!("poll loop stopped");
        self.events.publish(NetEvent::Stopped);
    }
}
