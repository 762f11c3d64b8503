//! Beat arithmetic on the local clock.

use std::time::Duration;

/// Beat period in milliseconds
pub fn period_ms(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// Quantize an offset from beat zero up to the next beat boundary
pub fn next_beat_offset(current_offset: f64, period: f64) -> f64 {
    (current_offset / period).ceil() * period
}

/// Beat grid anchored at a local start time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatSchedule {
    start_time: f64,
    period: f64,
}

impl BeatSchedule {
    /// `None` when the tempo cannot produce a grid (zero, negative, NaN).
    pub fn new(start_time_local: f64, bpm: f64) -> Option<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return None;
        }
        Some(Self {
            start_time: start_time_local,
            period: period_ms(bpm),
        })
    }

    pub fn period_ms(&self) -> f64 {
        self.period
    }

    /// Time until the next beat at or after `now_local`
    pub fn next_beat_in(&self, now_local: f64) -> Duration {
        let current = now_local - self.start_time;
        let next = next_beat_offset(current, self.period);
        Duration::from_nanos(((next - current) * 1e6).max(0.0).round() as u64)
    }

    /// Index of the beat at or after `now_local` (beat 0 is the start time)
    pub fn next_beat_index(&self, now_local: f64) -> i64 {
        ((now_local - self.start_time) / self.period).ceil() as i64
    }
}
