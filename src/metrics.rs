use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every pool operation.
pub(crate) struct PoolCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    busy_rejections: AtomicU64,
    reclaimed: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn new() -> Self {
        PoolCounters {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reclaimed(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the counters.
    pub(crate) fn snapshot(&self) -> PoolMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0_f64
        } else {
            hits as f64 / total as f64
        };
        PoolMetrics {
            hits,
            misses,
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

/// A point-in-time snapshot of pool statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMetrics {
    /// Acquisitions served from the cache.
    pub hits: u64,
    /// Acquisitions that constructed a fresh writer.
    pub misses: u64,
    /// Acquisitions rejected because another thread held the writer.
    pub busy_rejections: u64,
    /// Idle writers destroyed by the sweep.
    pub reclaimed: u64,
    /// `hits / (hits + misses)`, or `0.0` before the first acquisition.
    pub hit_rate: f64,
}

impl PoolMetrics {
    /// Successful acquisitions, cached or fresh.
    pub fn acquire_count(&self) -> u64 {
        self.hits + self.misses
    }
}
