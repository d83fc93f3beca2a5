//! Bandwidth estimation with a caller-imposed ceiling
//!
//! One estimator is shared by every chunk source of a build and survives
//! rebuilds. Throughput samples are smoothed with an EWMA; the ceiling is
//! a single atomic so it can be changed while pipelines are reading it.

use crate::{
    config::UNLIMITED_BITRATE,
    events::{EventBus, PipelineEvent},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument};

const EWMA_ALPHA: f64 = 0.2;

/// Bandwidth measurement sample
#[derive(Debug, Clone)]
pub struct BandwidthMeasurement {
    /// Bytes transferred
    pub bytes: u64,
    /// Time taken
    pub duration: Duration,
}

impl BandwidthMeasurement {
    /// Calculate throughput in bits per second
    pub fn throughput_bps(&self) -> u64 {
        if self.duration.as_secs_f64() > 0.0 {
            ((self.bytes as f64 * 8.0) / self.duration.as_secs_f64()) as u64
        } else {
            0
        }
    }
}

#[derive(Debug, Default)]
struct Samples {
    recorded: usize,
    estimate: Option<u64>,
}

/// Throughput estimator limited by a bitrate ceiling
#[derive(Debug)]
pub struct BandwidthEstimator {
    ceiling: AtomicU64,
    samples: Mutex<Samples>,
    events: Option<EventBus>,
}

impl BandwidthEstimator {
    /// Create an estimator without a ceiling
    pub fn new() -> Self {
        Self {
            ceiling: AtomicU64::new(UNLIMITED_BITRATE),
            samples: Mutex::new(Samples::default()),
            events: None,
        }
    }

    /// Create an estimator that reports samples on `events`
    pub fn with_events(events: EventBus) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    /// Current ceiling in bps ([`UNLIMITED_BITRATE`] when unset)
    pub fn bitrate_ceiling(&self) -> u64 {
        self.ceiling.load(Ordering::Acquire)
    }

    /// Replace the ceiling; visible to every reader immediately
    pub fn set_bitrate_ceiling(&self, bitrate: u64) {
        let previous = self.ceiling.swap(bitrate, Ordering::AcqRel);
        if previous != bitrate {
            info!(ceiling = bitrate, previous, "Bitrate ceiling changed");
            if let Some(events) = &self.events {
                events.publish(PipelineEvent::BitrateCeilingChanged { ceiling: bitrate });
            }
        }
    }

    /// Smoothed throughput, ignoring the ceiling
    pub fn measured_bitrate(&self) -> Option<u64> {
        self.samples.lock().estimate
    }

    /// Throughput estimate clamped to the ceiling.
    ///
    /// `None` until a sample exists. A ceiling below the measured rate wins.
    pub fn bitrate_estimate(&self) -> Option<u64> {
        self.measured_bitrate()
            .map(|measured| measured.min(self.bitrate_ceiling()))
    }

    /// Number of transfers recorded so far, including zero-length ones
    pub fn sample_count(&self) -> usize {
        self.samples.lock().recorded
    }

    /// Record a finished transfer
    #[instrument(skip(self))]
    pub fn record_transfer(&self, bytes: u64, duration: Duration) -> Option<u64> {
        let sample = BandwidthMeasurement { bytes, duration }.throughput_bps();

        let estimate = {
            let mut samples = self.samples.lock();
            samples.recorded += 1;

            if sample > 0 {
                samples.estimate = Some(match samples.estimate {
                    None => sample,
                    Some(prev) => {
                        ((prev as f64 * (1.0 - EWMA_ALPHA)) + (sample as f64 * EWMA_ALPHA)) as u64
                    }
                });
            }
            samples.estimate
        };

        let limited = estimate.map(|e| e.min(self.bitrate_ceiling()));

        debug!(
            bytes,
            duration_ms = duration.as_millis() as u64,
            throughput_mbps = sample as f64 / 1_000_000.0,
            estimate_bps = ?limited,
            "Bandwidth measurement recorded"
        );

        if let Some(events) = &self.events {
            events.publish(PipelineEvent::BandwidthSample {
                elapsed_ms: duration.as_millis() as u64,
                bytes,
                bitrate_estimate: limited,
            });
        }

        limited
    }
}

impl Default for BandwidthEstimator {
    fn default() -> Self {
        Self::new()
    }
}
