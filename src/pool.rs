//! The writer pool: acquire/release engine, administrative lockout,
//! idle-writer sweep, and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::builder::PoolBuilder;
use crate::entry::{current_thread, Entry, FREE};
use crate::error::PoolError;
use crate::factory::{JournalMetadata, WriterFactory};
use crate::interceptor::{CloseInterceptor, PoolableWriter};
use crate::metrics::{PoolCounters, PoolMetrics};
use crate::table::EntryTable;

// ---------------------------------------------------------------------------
// Pool interior
// ---------------------------------------------------------------------------

pub(crate) struct Inner<F: WriterFactory> {
    factory: F,
    table: EntryTable<F::Writer>,
    inactive_ttl_ms: u64,
    /// Anchor for all release timestamps.
    epoch: Instant,
    /// One-way latch; once set, no new writers are issued.
    closed: AtomicBool,
    counters: PoolCounters,
}

impl<F: WriterFactory> Inner<F> {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// One reclamation pass over a weakly-consistent snapshot of the table.
    ///
    /// Idle entries released before `deadline` are claimed by CAS, their
    /// writers destroyed, and their slots removed. Slots poisoned by a
    /// construction failure are removed unconditionally, whatever their age,
    /// so the name becomes retryable. Returns whether anything was removed.
    fn release_idle(&self, deadline: u64) -> bool {
        let me = current_thread();
        let mut removed = false;

        for (name, entry) in self.table.entries() {
            // The release stamp is read before the claim is attempted; the
            // CAS then revalidates that nobody re-acquired in between.
            if entry.last_release() < deadline && entry.owner() == FREE {
                if entry.try_swap_owner(FREE, me) {
                    if let Some(writer) = entry.take_writer() {
                        info!(journal = name.as_str(), "closing idle writer");
                        writer.clear_close_interceptor();
                        if let Err(err) = writer.destroy() {
                            error!(journal = name.as_str(), error = %err, "cannot close writer");
                        }
                        self.counters.record_reclaimed();
                    }
                    self.table.remove_if(&name, &entry);
                    removed = true;
                    // The slot is unreachable now; republish FREE for any
                    // thread still holding a stale reference to it.
                    entry.publish_owner(FREE);
                }
            } else if entry.error().is_some() {
                info!(journal = name.as_str(), "removing entry for failed writer");
                removed |= self.table.remove_if(&name, &entry);
            }
        }

        removed
    }
}

impl<F: WriterFactory> CloseInterceptor for Inner<F> {
    /// Release path: a pooled writer's `close()` lands here.
    fn can_close(&self, writer: &dyn PoolableWriter) -> bool {
        let name = writer.name();
        let Some(entry) = self.table.get(name) else {
            // Not ours; let the writer close itself from now on.
            error!(journal = name, "writer is not managed by this pool");
            writer.clear_close_interceptor();
            return true;
        };

        let me = current_thread();
        if !entry.try_swap_owner(me, FREE) {
            error!(
                journal = name,
                owner = entry.owner(),
                "release attempted by a thread that does not own the writer"
            );
            return false;
        }

        if self.is_closed() {
            // The shutdown sweep may have missed this writer because we
            // still owned it, or may be racing us right now. Whichever of
            // the two re-claims the slot becomes the designated destroyer;
            // the other steps aside.
            if entry.try_swap_owner(FREE, me) {
                info!(journal = name, "closing writer");
                writer.clear_close_interceptor();
                entry.take_writer();
                return true;
            }
        }

        entry.stamp_release(self.now_ms());
        debug!(journal = name, "writer is back in pool");
        false
    }
}

// ---------------------------------------------------------------------------
// Pool handle
// ---------------------------------------------------------------------------

/// A caching pool of exclusive journal writers.
///
/// The pool amortizes the cost of opening append-only writers by keeping
/// released ones alive, while enforcing the single-writer rule: a journal's
/// writer belongs to at most one thread at a time. Ownership is transferred
/// by compare-and-swap on a per-slot owner word, so no pool-wide lock is
/// taken on the hot path, and no operation ever waits for another thread.
///
/// Handles are cheap clones sharing one interior.
pub struct WriterPool<F: WriterFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: WriterFactory> Clone for WriterPool<F> {
    fn clone(&self) -> Self {
        WriterPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: WriterFactory> WriterPool<F> {
    pub(crate) fn new(factory: F, inactive_ttl: Duration, num_shards: usize) -> Self {
        WriterPool {
            inner: Arc::new(Inner {
                factory,
                table: EntryTable::new(num_shards),
                inactive_ttl_ms: u64::try_from(inactive_ttl.as_millis()).unwrap_or(u64::MAX),
                epoch: Instant::now(),
                closed: AtomicBool::new(false),
                counters: PoolCounters::new(),
            }),
        }
    }

    /// Returns a [`PoolBuilder`] for constructing a new pool.
    pub fn builder(factory: F) -> PoolBuilder<F> {
        PoolBuilder::new(factory)
    }

    // -----------------------------------------------------------------------
    // Acquire
    // -----------------------------------------------------------------------

    /// Hands out the exclusive writer for the journal named by `metadata`.
    ///
    /// The calling thread becomes the writer's owner until it calls
    /// [`close`] on it. A cached writer is reused when the slot is free; a
    /// fresh one is constructed through the base factory otherwise. The same
    /// thread may re-acquire a writer it already holds and gets the same
    /// handle back.
    ///
    /// [`close`]: PoolableWriter::close
    pub fn writer(&self, metadata: &JournalMetadata) -> Result<Arc<F::Writer>, PoolError> {
        let inner = &*self.inner;
        if inner.is_closed() {
            debug!("pool is closed");
            return Err(PoolError::Closed);
        }

        let name = metadata.name();
        let me = current_thread();

        let entry = match inner.table.get(name) {
            Some(entry) => entry,
            None => {
                // Racing to create the slot; the creator owns a fresh entry
                // without a separate CAS.
                let fresh = Arc::new(Entry::new(me, inner.now_ms()));
                match inner.table.put_if_absent(name, Arc::clone(&fresh)) {
                    None => return self.construct(metadata, &fresh, me),
                    Some(resident) => {
                        debug!(journal = name, thread = me, "lost race to create writer slot");
                        resident
                    }
                }
            }
        };

        // A recorded construction failure is reported identically to every
        // acquirer until the sweep removes the poisoned slot.
        if let Some(source) = entry.error() {
            return Err(PoolError::ConstructionFailed {
                name: name.to_string(),
                source,
            });
        }
        if entry.is_locked() {
            return Err(PoolError::JournalLocked {
                name: name.to_string(),
            });
        }

        if entry.try_swap_owner(FREE, me) {
            // Lockout publishes `locked` before giving up ownership, but
            // revalidate under ownership before handing anything out.
            if entry.is_locked() {
                entry.try_swap_owner(me, FREE);
                return Err(PoolError::JournalLocked {
                    name: name.to_string(),
                });
            }
            let Some(writer) = entry.writer() else {
                entry.try_swap_owner(me, FREE);
                return Err(PoolError::IllegalState {
                    name: name.to_string(),
                    reason: "slot has no writer",
                });
            };
            if inner.is_closed() {
                // Shutdown began after the closed check above; the caller
                // takes full ownership and its close destroys the writer.
                debug!(journal = name, "pool closed, detaching writer");
                writer.clear_close_interceptor();
            }
            inner.counters.record_hit();
            debug!(journal = name, thread = me, "cached writer reused");
            return Ok(writer);
        }

        // The claim failed; read the owner exactly once.
        let owner = entry.owner();
        if owner == me {
            // Re-entrant acquire: the writer is already ours.
            let Some(writer) = entry.writer() else {
                return Err(PoolError::IllegalState {
                    name: name.to_string(),
                    reason: "slot has no writer",
                });
            };
            if inner.is_closed() {
                debug!(journal = name, "pool closed, detaching writer");
                writer.clear_close_interceptor();
            }
            inner.counters.record_hit();
            return Ok(writer);
        }

        inner.counters.record_busy();
        error!(journal = name, owner, "writer is owned by another thread");
        Err(PoolError::WriterBusy {
            name: name.to_string(),
            owner,
        })
    }

    /// Builds the writer for a slot this thread just created and owns.
    fn construct(
        &self,
        metadata: &JournalMetadata,
        entry: &Arc<Entry<F::Writer>>,
        me: u64,
    ) -> Result<Arc<F::Writer>, PoolError> {
        let inner = &*self.inner;
        let name = metadata.name();

        match inner.factory.open(metadata) {
            Ok(writer) => {
                let writer = Arc::new(writer);
                let dyn_inner: Arc<dyn CloseInterceptor> = Arc::clone(&self.inner) as Arc<dyn CloseInterceptor>;
                let hook: Weak<dyn CloseInterceptor> = Arc::downgrade(&dyn_inner);
                writer.install_close_interceptor(hook);
                entry.put_writer(Arc::clone(&writer));
                inner.counters.record_miss();
                info!(journal = name, thread = me, "writer allocated");
                Ok(writer)
            }
            Err(err) => {
                let err = Arc::new(err);
                entry.record_error(Arc::clone(&err));
                error!(journal = name, thread = me, error = %err, "failed to allocate writer");
                Err(PoolError::ConstructionFailed {
                    name: name.to_string(),
                    source: err,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Administrative lockout
    // -----------------------------------------------------------------------

    /// Reserves `name` so no writer can be issued from it, destroying any
    /// cached writer. Used ahead of destructive journal operations.
    ///
    /// A second `lock` by the same thread is idempotent.
    pub fn lock(&self, name: &str) -> Result<(), PoolError> {
        let inner = &*self.inner;
        if inner.is_closed() {
            debug!("pool is closed");
            return Err(PoolError::Closed);
        }

        let me = current_thread();
        let entry = match inner.table.get(name) {
            Some(entry) => entry,
            None => {
                let fresh = Arc::new(Entry::new(me, inner.now_ms()));
                match inner.table.put_if_absent(name, Arc::clone(&fresh)) {
                    None => {
                        fresh.set_locked(true);
                        info!(journal = name, thread = me, "journal locked");
                        return Ok(());
                    }
                    Some(resident) => resident,
                }
            }
        };

        if entry.try_swap_owner(FREE, me) || entry.owner() == me {
            if let Some(writer) = entry.take_writer() {
                info!(journal = name, thread = me, "locking journal, closing cached writer");
                writer.clear_close_interceptor();
                if let Err(err) = writer.destroy() {
                    warn!(journal = name, error = %err, "cannot close writer while locking");
                }
            }
            entry.set_locked(true);
            info!(journal = name, thread = me, "journal locked");
            return Ok(());
        }

        Err(PoolError::WriterBusy {
            name: name.to_string(),
            owner: entry.owner(),
        })
    }

    /// Releases an administrative lock taken by this thread.
    ///
    /// A missing entry, or a lock held by another thread, is a no-op.
    /// Unlocking a journal whose writer is still checked out is rejected.
    pub fn unlock(&self, name: &str) -> Result<(), PoolError> {
        let Some(entry) = self.inner.table.get(name) else {
            return Ok(());
        };

        let me = current_thread();
        if entry.owner() == me {
            // A locked slot never carries a writer; if one is present the
            // caller is unlocking a journal it merely checked out.
            if entry.has_writer() {
                return Err(PoolError::IllegalState {
                    name: name.to_string(),
                    reason: "journal is not locked",
                });
            }
            self.inner.table.remove(name);
            info!(journal = name, thread = me, "journal unlocked");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sweep and shutdown
    // -----------------------------------------------------------------------

    /// One cooperative reclamation pass: destroys writers idle past the
    /// inactive TTL and garbage-collects slots whose construction failed.
    ///
    /// Safe to call from any thread, at any time, concurrently with every
    /// other operation. Returns `true` if any slot was removed — a hint to
    /// the scheduler that another pass soon may be worthwhile.
    pub fn run(&self) -> bool {
        let inner = &*self.inner;
        let deadline = inner.now_ms().saturating_sub(inner.inactive_ttl_ms);
        inner.release_idle(deadline)
    }

    /// Closes the pool: a one-way transition after which no acquires
    /// succeed, followed by a sweep of every idle writer.
    ///
    /// Writers currently checked out cannot be reclaimed here; their
    /// owners keep using them safely, and each one is physically destroyed
    /// when its holder eventually calls `close` on it. This method never
    /// blocks waiting for holders.
    pub fn close(&self) {
        let inner = &*self.inner;
        inner.closed.store(true, Ordering::SeqCst);
        inner.release_idle(u64::MAX);
        info!("writer pool closed");
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of journal slots currently tracked.
    pub fn size(&self) -> usize {
        self.inner.table.len()
    }

    /// `true` if no journal slots are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }

    /// Number of tracked slots not owned by any thread.
    pub fn count_free_writers(&self) -> usize {
        let mut count = 0;
        for (name, entry) in self.inner.table.entries() {
            let owner = entry.owner();
            if owner == FREE {
                count += 1;
            } else {
                debug!(journal = name.as_str(), owner, "writer is still owned");
            }
        }
        count
    }

    /// Whether [`close`](WriterPool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// TTL after which an idle writer becomes eligible for the sweep.
    pub fn inactive_ttl(&self) -> Duration {
        Duration::from_millis(self.inner.inactive_ttl_ms)
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.inner.counters.snapshot()
    }
}
