//! WAL position bookkeeping
//!
//! Tracks the three positions reported back to the server. The stream
//! reader and the keepalive writer share one [`WalPositions`], so the
//! counters are atomic.
//!
//! Invariant: `flushed <= applied <= received`, and each position only ever
//! moves forward.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::messages::StandbyStatusUpdate;
use crate::utils::lsn::Lsn;
use crate::utils::timestamp::now_pg_timestamp;

#[derive(Debug, Default)]
pub struct WalPositions {
    received: AtomicU64,
    flushed: AtomicU64,
    applied: AtomicU64,
}

impl WalPositions {
    pub fn new(start: Lsn) -> Self {
        Self {
            received: AtomicU64::new(start.0),
            flushed: AtomicU64::new(start.0),
            applied: AtomicU64::new(start.0),
        }
    }

    pub fn received(&self) -> Lsn {
        Lsn(self.received.load(Ordering::SeqCst))
    }

    pub fn flushed(&self) -> Lsn {
        Lsn(self.flushed.load(Ordering::SeqCst))
    }

    pub fn applied(&self) -> Lsn {
        Lsn(self.applied.load(Ordering::SeqCst))
    }

    /// Record a position observed on the stream; never moves backwards
    pub fn observe(&self, lsn: Lsn) {
        if lsn.is_valid() {
            self.received.fetch_max(lsn.0, Ordering::SeqCst);
        }
    }

    /// Advance the applied position, capped at the received position
    pub fn advance_applied(&self, lsn: Lsn) {
        let cap = self.received.load(Ordering::SeqCst);
        self.applied.fetch_max(lsn.0.min(cap), Ordering::SeqCst);
    }

    /// Advance the flushed (durable) position, capped at the applied
    /// position. Never advanced automatically; the consumer decides when
    /// its processing is durable.
    pub fn advance_flushed(&self, lsn: Lsn) {
        let cap = self.applied.load(Ordering::SeqCst);
        self.flushed.fetch_max(lsn.0.min(cap), Ordering::SeqCst);
    }

    /// Snapshot the positions into a feedback message stamped with the
    /// current client clock
    pub fn status_update(&self, reply_requested: bool) -> StandbyStatusUpdate {
        StandbyStatusUpdate {
            write_lsn: self.received(),
            flush_lsn: self.flushed(),
            apply_lsn: self.applied(),
            client_clock: now_pg_timestamp(),
            reply_requested: reply_requested as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_is_monotonic() {
        let positions = WalPositions::default();
        positions.observe(Lsn(100));
        assert_eq!(positions.received(), Lsn(100));

        // lower observations do not move it back
        positions.observe(Lsn(50));
        assert_eq!(positions.received(), Lsn(100));

        positions.observe(Lsn(150));
        assert_eq!(positions.received(), Lsn(150));
    }

    #[test]
    fn invalid_lsn_is_ignored() {
        let positions = WalPositions::default();
        positions.observe(Lsn::INVALID);
        assert_eq!(positions.received(), Lsn(0));
    }

    #[test]
    fn flushed_never_exceeds_applied_never_exceeds_received() {
        let positions = WalPositions::default();
        positions.observe(Lsn(100));

        positions.advance_applied(Lsn(500));
        assert_eq!(positions.applied(), Lsn(100));

        positions.advance_flushed(Lsn(500));
        assert_eq!(positions.flushed(), Lsn(100));

        positions.observe(Lsn(200));
        positions.advance_applied(Lsn(150));
        positions.advance_flushed(Lsn(120));
        assert_eq!(positions.applied(), Lsn(150));
        assert_eq!(positions.flushed(), Lsn(120));
    }

    #[test]
    fn status_update_snapshots_positions() {
        let positions = WalPositions::new(Lsn(10));
        positions.observe(Lsn(40));
        positions.advance_applied(Lsn(30));
        positions.advance_flushed(Lsn(20));

        let update = positions.status_update(true);
        assert_eq!(update.write_lsn, Lsn(40));
        assert_eq!(update.flush_lsn, Lsn(20));
        assert_eq!(update.apply_lsn, Lsn(30));
        assert_eq!(update.reply_requested, 1);
    }
}
