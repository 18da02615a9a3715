//! Heartbeat round-trip estimation.
//!
//! RFC 6298 smoothing applied to heartbeat echoes. The controller stamps each
//! heartbeat with its millisecond clock; the robot echoes it unchanged, so
//! `now - timestamp` (wrapping) is one round trip.

use std::time::Duration;

/// Smoothing constants.
pub mod constants {
    /// Alpha for SRTT smoothing (0.125 = 1/8).
    pub const SRTT_ALPHA: f64 = 0.125;

    /// Beta for RTTVAR smoothing (0.25 = 1/4).
    pub const RTTVAR_BETA: f64 = 0.25;
}

/// Smoothed RTT and RTT variance.
#[derive(Debug, Clone, Default)]
pub struct RttEstimator {
    /// Smoothed RTT in milliseconds.
    srtt: f64,
    /// RTT variance in milliseconds.
    rttvar: f64,
    /// Latest raw sample.
    latest: Option<u32>,
    /// Samples taken since the last reset.
    samples: u64,
}

impl RttEstimator {
    /// Create an estimator with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a round-trip sample in milliseconds.
    ///
    /// - First measurement: SRTT = sample, RTTVAR = sample / 2
    /// - Subsequent: RTTVAR = 0.75 * RTTVAR + 0.25 * |SRTT - sample|,
    ///   SRTT = 0.875 * SRTT + 0.125 * sample
    pub fn update(&mut self, sample_ms: u32) {
        let sample = sample_ms as f64;
        if self.samples == 0 {
            self.srtt = sample;
            self.rttvar = sample / 2.0;
        } else {
            self.rttvar = (1.0 - constants::RTTVAR_BETA) * self.rttvar
                + constants::RTTVAR_BETA * (self.srtt - sample).abs();
            self.srtt = (1.0 - constants::SRTT_ALPHA) * self.srtt + constants::SRTT_ALPHA * sample;
        }
        self.latest = Some(sample_ms);
        self.samples += 1;
    }

    /// Smoothed RTT, once at least one sample arrived.
    pub fn srtt(&self) -> Option<Duration> {
        self.is_initialized()
            .then(|| Duration::from_secs_f64(self.srtt / 1000.0))
    }

    /// Smoothed RTT in milliseconds.
    pub fn srtt_ms(&self) -> f64 {
        self.srtt
    }

    /// RTT variance, once at least one sample arrived.
    pub fn rttvar(&self) -> Option<Duration> {
        self.is_initialized()
            .then(|| Duration::from_secs_f64(self.rttvar / 1000.0))
    }

    /// Latest raw sample in milliseconds.
    pub fn latest_ms(&self) -> Option<u32> {
        self.latest
    }

    /// Number of samples since the last reset.
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Check if at least one sample arrived.
    pub fn is_initialized(&self) -> bool {
        self.samples > 0
    }

    /// Forget every sample. Called when a pairing session ends.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
