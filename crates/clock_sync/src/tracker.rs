//! Clock offset tracker.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, instrument};

/// Offset between the remote control clock and the local clock.
///
/// Starts at 0, is overwritten (never averaged) by every sync, and never
/// expires. Lock-free so the coordinator can share it between the command
/// handler and any reader.
#[derive(Debug)]
pub struct ClockSync {
    /// f64 offset in milliseconds, stored as bits
    offset_bits: AtomicU64,
    /// Number of syncs recorded
    sync_count: AtomicU64,
}

impl ClockSync {
    /// Create a tracker with a zero offset
    pub fn new() -> Self {
        Self {
            offset_bits: AtomicU64::new(0f64.to_bits()),
            sync_count: AtomicU64::new(0),
        }
    }

    /// Record one sync round-trip: `offset = local_at_receipt - remote_client_time`.
    ///
    /// Returns the new offset.
    #[instrument(level = "debug", name = "clock_sync_record", skip(self))]
    pub fn record_sync(&self, local_at_receipt: f64, remote_client_time: f64) -> f64 {
        let offset = local_at_receipt - remote_client_time;
        self.offset_bits.store(offset.to_bits(), Ordering::Release);
        let count = self.sync_count.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(offset_ms = offset, syncs = count, "Clock offset updated");
        observability::record_clock_offset_ms(offset);

        offset
    }

    /// Convert a remote timestamp into local time
    pub fn to_local(&self, remote_timestamp: f64) -> f64 {
        remote_timestamp + self.offset()
    }

    /// Current offset in milliseconds
    pub fn offset(&self) -> f64 {
        f64::from_bits(self.offset_bits.load(Ordering::Acquire))
    }

    /// Number of syncs recorded so far
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::Relaxed)
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_offset_is_zero() {
        let sync = ClockSync::new();
        assert_eq!(sync.offset(), 0.0);
        assert_eq!(sync.to_local(42.0), 42.0);
        assert_eq!(sync.sync_count(), 0);
    }

    #[test]
    fn test_to_local_inverts_record_sync() {
        let sync = ClockSync::new();
        let offset = sync.record_sync(1000.0, 100.0);

        assert_eq!(offset, 900.0);
        assert_eq!(sync.to_local(100.0), 1000.0);
        assert_eq!(sync.to_local(250.5), 1150.5);
    }

    #[test]
    fn test_sync_overwrites_previous_offset() {
        let sync = ClockSync::new();
        sync.record_sync(1000.0, 100.0);
        sync.record_sync(5000.0, 7000.0);

        // no averaging with the earlier sample
        assert_eq!(sync.offset(), -2000.0);
        assert_eq!(sync.to_local(7000.0), 5000.0);
        assert_eq!(sync.sync_count(), 2);
    }
}
