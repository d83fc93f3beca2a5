//! Cross-track timestamp continuity
//!
//! MPEG-TS timestamps are 33-bit 90 kHz counters that wrap and restart at
//! discontinuities. One adjuster per discontinuity sequence maps them onto
//! a shared microsecond timeline so tracks fetched by different chunk
//! sources stay aligned.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One past the largest 33-bit PTS value
pub const MAX_PTS_PLUS_ONE: u64 = 0x2_0000_0000;

/// Convert a 90 kHz timestamp to microseconds
pub fn pts_to_us(pts: u64) -> i64 {
    ((pts as u128 * 1_000_000) / 90_000) as i64
}

/// Convert microseconds to a 90 kHz timestamp
pub fn us_to_pts(us: i64) -> u64 {
    ((us.max(0) as u128 * 90_000) / 1_000_000) as u64
}

#[derive(Debug)]
struct AdjusterState {
    offset_us: i64,
    last_pts: Option<u64>,
}

/// Maps raw PTS values onto the playback timeline
#[derive(Debug)]
pub struct TimestampAdjuster {
    first_sample_us: i64,
    state: Mutex<AdjusterState>,
}

impl TimestampAdjuster {
    /// The first adjusted sample lands on `first_sample_us`
    pub fn new(first_sample_us: i64) -> Self {
        Self {
            first_sample_us,
            state: Mutex::new(AdjusterState {
                offset_us: 0,
                last_pts: None,
            }),
        }
    }

    /// True once the first sample has fixed the offset
    pub fn is_initialized(&self) -> bool {
        self.state.lock().last_pts.is_some()
    }

    /// Adjust a raw 33-bit PTS, unwrapping it towards the previous sample
    pub fn adjust(&self, pts: u64) -> i64 {
        let mut state = self.state.lock();

        let unwrapped = match state.last_pts {
            Some(last) => {
                let closest_wrap = (last + MAX_PTS_PLUS_ONE / 2) / MAX_PTS_PLUS_ONE;
                let above = pts + MAX_PTS_PLUS_ONE * closest_wrap;
                match closest_wrap.checked_sub(1) {
                    Some(wrap) => {
                        let below = pts + MAX_PTS_PLUS_ONE * wrap;
                        if below.abs_diff(last) < above.abs_diff(last) {
                            below
                        } else {
                            above
                        }
                    }
                    None => above,
                }
            }
            None => pts,
        };

        let time_us = pts_to_us(unwrapped);
        if state.last_pts.is_none() {
            state.offset_us = self.first_sample_us - time_us;
        }
        state.last_pts = Some(unwrapped);

        time_us + state.offset_us
    }
}

/// Shared registry of adjusters keyed by discontinuity sequence
#[derive(Debug, Default)]
pub struct TimestampAdjusterProvider {
    adjusters: Mutex<HashMap<u64, Arc<TimestampAdjuster>>>,
}

impl TimestampAdjusterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjuster for `discontinuity_sequence`.
    ///
    /// Only the primary source creates adjusters; other sources get one
    /// once the primary has fed it a sample.
    pub fn adjuster(
        &self,
        is_primary: bool,
        discontinuity_sequence: u64,
        start_time_us: i64,
    ) -> Option<Arc<TimestampAdjuster>> {
        let mut adjusters = self.adjusters.lock();

        if is_primary {
            let adjuster = adjusters
                .entry(discontinuity_sequence)
                .or_insert_with(|| Arc::new(TimestampAdjuster::new(start_time_us)));
            return Some(Arc::clone(adjuster));
        }

        adjusters
            .get(&discontinuity_sequence)
            .filter(|a| a.is_initialized())
            .cloned()
    }

    /// Forget every adjuster, e.g. after a seek
    pub fn reset(&self) {
        self.adjusters.lock().clear();
    }
}
