//! Per-journal slot: the cached writer plus its ownership and lock state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::WriterError;

// ---------------------------------------------------------------------------
// Thread identity
// ---------------------------------------------------------------------------

/// Owner sentinel meaning "no thread holds this slot".
pub(crate) const FREE: u64 = 0;

/// Real thread ids start at 1 so they can never collide with [`FREE`].
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Returns the calling thread's pool-local id.
pub(crate) fn current_thread() -> u64 {
    THREAD_ID.with(|id| *id)
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One slot per journal name tracked by the pool.
///
/// `owner` is the sole synchronization edge for ownership transfer: it is
/// mutated only by compare-and-swap, and a successful `FREE → thread` swap
/// makes the releasing thread's writes to the writer slot visible to the
/// new owner. All other fields are written only by the current owner (or by
/// the creating thread before the entry is published into the table).
pub(crate) struct Entry<W> {
    /// Owning thread id, or [`FREE`].
    owner: AtomicU64,
    /// The cached writer. Absent while the slot is locked, poisoned by a
    /// construction failure, or reclaimed during shutdown.
    writer: Mutex<Option<Arc<W>>>,
    /// Milliseconds since the pool epoch at the most recent release.
    last_release: AtomicU64,
    /// Administrative lockout flag; while set, no writer may be issued.
    locked: AtomicBool,
    /// Construction failure captured by the creating thread; reported to
    /// every later acquirer until the sweep removes the slot.
    error: Mutex<Option<Arc<WriterError>>>,
}

impl<W> Entry<W> {
    /// Creates a slot owned by `creator`, so the creating thread holds it
    /// without a separate CAS.
    pub(crate) fn new(creator: u64, now_ms: u64) -> Self {
        Entry {
            owner: AtomicU64::new(creator),
            writer: Mutex::new(None),
            last_release: AtomicU64::new(now_ms),
            locked: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }

    /// Attempts the `current → next` transition on the owner word.
    pub(crate) fn try_swap_owner(&self, current: u64, next: u64) -> bool {
        self.owner
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditionally publishes a new owner with release semantics.
    pub(crate) fn publish_owner(&self, owner: u64) {
        self.owner.store(owner, Ordering::Release);
    }

    pub(crate) fn writer(&self) -> Option<Arc<W>> {
        self.writer.lock().clone()
    }

    pub(crate) fn put_writer(&self, writer: Arc<W>) {
        *self.writer.lock() = Some(writer);
    }

    pub(crate) fn take_writer(&self) -> Option<Arc<W>> {
        self.writer.lock().take()
    }

    pub(crate) fn has_writer(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Stamped at the instant of release; read lock-free by the sweep.
    pub(crate) fn stamp_release(&self, now_ms: u64) {
        self.last_release.store(now_ms, Ordering::Release);
    }

    pub(crate) fn last_release(&self) -> u64 {
        self.last_release.load(Ordering::Acquire)
    }

    pub(crate) fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Release);
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub(crate) fn record_error(&self, error: Arc<WriterError>) {
        *self.error.lock() = Some(error);
    }

    pub(crate) fn error(&self) -> Option<Arc<WriterError>> {
        self.error.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_owns_fresh_entry() {
        let e: Entry<()> = Entry::new(7, 0);
        assert_eq!(e.owner(), 7);
        assert!(!e.try_swap_owner(FREE, 9), "slot is not free");
        assert!(e.try_swap_owner(7, FREE));
        assert_eq!(e.owner(), FREE);
    }

    #[test]
    fn owner_cas_is_exclusive() {
        let e: Entry<()> = Entry::new(FREE, 0);
        assert!(e.try_swap_owner(FREE, 1));
        assert!(!e.try_swap_owner(FREE, 2));
        assert_eq!(e.owner(), 1);
    }

    #[test]
    fn thread_ids_are_distinct_and_nonzero() {
        let mine = current_thread();
        assert_ne!(mine, FREE);
        let other = std::thread::spawn(current_thread).join().unwrap();
        assert_ne!(other, FREE);
        assert_ne!(mine, other);
    }
}
