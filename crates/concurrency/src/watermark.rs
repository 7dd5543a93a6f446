//! Commit watermark for multi-index visibility
//!
//! A trace record touches up to five structures (arena + four indexes).
//! Readers must never see it in one and not another, yet writers for
//! unrelated keys must not serialize on a global lock. The watermark
//! resolves this:
//!
//! ```text
//! 1. reserve()      - allocate the next RecordId (not yet visible)
//! 2. write arena + every index entry for that id
//! 3. finish(id)     - mark done; advance watermark over the contiguous prefix
//! ```
//!
//! A reader captures `watermark()` once and ignores every index entry whose
//! id is at or above it. Ids below the watermark are finished (committed or
//! abandoned), so a snapshot is all-or-nothing per record.
//!
//! Abandoned ids (a WAL failure or a panicking writer after `reserve`) are
//! finished too, so they never stall the watermark. Writers hold a
//! [`Reservation`], which finishes its id when dropped, including during
//! unwinding.

use parking_lot::Mutex;
use skytrace_core::RecordId;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates record ids and publishes the visibility watermark
#[derive(Debug, Default)]
pub struct CommitTracker {
    /// Next id handed out by `reserve`
    next_id: AtomicU64,
    /// Every id strictly below this is finished
    visible: AtomicU64,
    /// Finished ids above the watermark, waiting for a gap to close
    pending: Mutex<BTreeSet<u64>>,
}

impl CommitTracker {
    /// Tracker starting at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next record id
    pub fn reserve(&self) -> RecordId {
        RecordId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Allocate the next record id as a guard that finishes it on drop
    pub fn begin(&self) -> Reservation<'_> {
        Reservation {
            tracker: self,
            id: self.reserve(),
        }
    }

    /// Mark an id committed or abandoned
    ///
    /// Advances the watermark across every contiguous finished id.
    pub fn finish(&self, id: RecordId) {
        let mut pending = self.pending.lock();
        pending.insert(id.as_u64());

        let mut visible = self.visible.load(Ordering::Acquire);
        while pending.remove(&visible) {
            visible += 1;
        }
        self.visible.store(visible, Ordering::Release);
    }

    /// Current watermark; ids strictly below it are visible
    pub fn watermark(&self) -> RecordId {
        RecordId::new(self.visible.load(Ordering::Acquire))
    }

    /// Whether `id` is visible at the current watermark
    pub fn is_visible(&self, id: RecordId) -> bool {
        id < self.watermark()
    }

    /// Ids reserved so far
    pub fn reserved(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Ids reserved but not finished yet
    pub fn in_flight(&self) -> u64 {
        // visible only moves under the pending lock
        let pending = self.pending.lock();
        let finished = self.visible.load(Ordering::Acquire) + pending.len() as u64;
        self.reserved().saturating_sub(finished)
    }
}

/// A reserved id, finished when the guard goes away
#[must_use = "dropping a reservation finishes its id immediately"]
#[derive(Debug)]
pub struct Reservation<'a> {
    tracker: &'a CommitTracker,
    id: RecordId,
}

impl Reservation<'_> {
    /// The reserved id
    pub fn id(&self) -> RecordId {
        self.id
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.tracker.finish(self.id);
    }
}
