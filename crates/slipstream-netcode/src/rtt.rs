//! Round-trip time estimation
//!
//! Smooths request/response timing with an exponential moving average and
//! derives how far in the past the renderer should look so that both
//! snapshots bracketing the render time have already arrived.
//!
//! The same timing echo also yields the offset between the server's clock
//! and the local one, so server-stamped samples can be placed on the local
//! timeline the renderer queries.

use crate::config::check_alpha;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use slipstream_core::Timestamp;

/// Weight of each new RTT sample in the moving average
pub const RTT_ALPHA: f64 = 0.25;
/// Fixed cushion added to half the smoothed RTT
pub const DELAY_CUSHION_MS: f64 = 40.0;
/// Lower bound of the interpolation delay
pub const MIN_DELAY_MS: f64 = 150.0;
/// Upper bound of the interpolation delay
pub const MAX_DELAY_MS: f64 = 300.0;

/// Tunables for `RttEstimator`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RttConfig {
    pub alpha: f64,
    pub cushion_ms: f64,
    pub min_delay_ms: f64,
    pub max_delay_ms: f64,
}

impl Default for RttConfig {
    fn default() -> Self {
        Self {
            alpha: RTT_ALPHA,
            cushion_ms: DELAY_CUSHION_MS,
            min_delay_ms: MIN_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
        }
    }
}

impl RttConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        check_alpha("rtt.alpha", self.alpha)?;
        if !(self.min_delay_ms >= 0.0 && self.min_delay_ms <= self.max_delay_ms) {
            return Err(Error::Config(format!(
                "rtt delay bounds inverted: [{}, {}]",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !self.cushion_ms.is_finite() {
            return Err(Error::Config("rtt.cushion_ms must be finite".to_string()));
        }
        Ok(())
    }
}

/// Current round-trip estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttEstimate {
    /// Exponentially smoothed round trip in milliseconds
    pub smoothed_rtt_ms: f64,
    /// Most recent one-way latency estimate in milliseconds
    pub one_way_ms: f64,
    /// How far in the past the renderer looks, always within the delay bounds
    pub interpolation_delay_ms: f64,
    /// Number of samples folded into the estimate
    pub samples: u64,
}

/// Online RTT estimator
#[derive(Debug, Clone)]
pub struct RttEstimator {
    config: RttConfig,
    estimate: RttEstimate,
    /// Smoothed `server clock - local clock`
    clock_offset_ms: Option<f64>,
}

impl RttEstimator {
    /// Create an estimator with no samples yet
    ///
    /// Until the first sample arrives the interpolation delay sits at the
    /// lower bound.
    pub fn new(config: RttConfig) -> Self {
        let estimate = RttEstimate {
            smoothed_rtt_ms: 0.0,
            one_way_ms: 0.0,
            interpolation_delay_ms: config.min_delay_ms,
            samples: 0,
        };
        Self {
            config,
            estimate,
            clock_offset_ms: None,
        }
    }

    /// Fold in the timing of one successful response
    ///
    /// `echoed_send_time` is the client send timestamp the server echoed
    /// back; `processing_ms` is the server's reported handling time. Returns
    /// the measured RTT, or `None` if the sample was unusable (the estimate
    /// is left untouched in that case).
    pub fn observe(
        &mut self,
        echoed_send_time: Timestamp,
        received_at: Timestamp,
        processing_ms: Option<f64>,
    ) -> Option<f64> {
        if received_at < echoed_send_time {
            log::debug!(
                "ignoring RTT sample: receive {} precedes echoed send {}",
                received_at,
                echoed_send_time
            );
            return None;
        }
        let rtt = (received_at - echoed_send_time) as f64;
        self.observe_rtt(rtt, processing_ms);
        Some(rtt)
    }

    /// Fold in a raw RTT measurement in milliseconds
    pub fn observe_rtt(&mut self, rtt: f64, processing_ms: Option<f64>) {
        if !rtt.is_finite() || rtt < 0.0 {
            return;
        }

        let one_way = match processing_ms.filter(|p| p.is_finite()) {
            Some(processing) => ((rtt - processing) / 2.0).max(0.0),
            None => rtt / 2.0,
        };

        let smoothed = if self.estimate.samples == 0 {
            rtt
        } else {
            self.estimate.smoothed_rtt_ms * (1.0 - self.config.alpha) + rtt * self.config.alpha
        };

        self.estimate = RttEstimate {
            smoothed_rtt_ms: smoothed,
            one_way_ms: one_way,
            interpolation_delay_ms: self.delay_for(smoothed),
            samples: self.estimate.samples + 1,
        };
    }

    fn delay_for(&self, smoothed: f64) -> f64 {
        (smoothed / 2.0 + self.config.cushion_ms)
            .round()
            .clamp(self.config.min_delay_ms, self.config.max_delay_ms)
    }

    /// Fold in the server's send timestamp from a response received at
    /// `received_at`
    ///
    /// The server stamped the response one one-way latency before it
    /// arrived. Needs at least one RTT sample; returns the smoothed offset.
    pub fn observe_server_time(
        &mut self,
        server_time: Timestamp,
        received_at: Timestamp,
    ) -> Option<f64> {
        if self.estimate.samples == 0 {
            return None;
        }
        let sent_locally = received_at as f64 - self.estimate.one_way_ms;
        let sample = server_time as f64 - sent_locally;
        let offset = match self.clock_offset_ms {
            Some(prev) => prev * (1.0 - self.config.alpha) + sample * self.config.alpha,
            None => sample,
        };
        self.clock_offset_ms = Some(offset);
        Some(offset)
    }

    /// Smoothed offset of the server clock from the local clock, if known
    pub fn clock_offset_ms(&self) -> Option<f64> {
        self.clock_offset_ms
    }

    /// Map a server timestamp onto the local clock
    ///
    /// Returns `None` until an offset is known or if the result would fall
    /// before the local epoch.
    pub fn to_local_time(&self, server_time: Timestamp) -> Option<Timestamp> {
        let local = (server_time as f64 - self.clock_offset_ms?).round();
        (local.is_finite() && local >= 0.0).then_some(local as Timestamp)
    }

    /// Current estimate
    pub fn estimate(&self) -> RttEstimate {
        self.estimate
    }

    /// Smoothed RTT, or `None` before the first sample
    pub fn smoothed_rtt_ms(&self) -> Option<f64> {
        (self.estimate.samples > 0).then_some(self.estimate.smoothed_rtt_ms)
    }

    /// Current interpolation delay in milliseconds
    pub fn interpolation_delay_ms(&self) -> f64 {
        self.estimate.interpolation_delay_ms
    }

    /// Forget all samples
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(RttConfig::default())
    }
}
