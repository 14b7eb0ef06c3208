use std::time::Duration;

use crate::factory::WriterFactory;
use crate::pool::WriterPool;

/// Writers idle longer than this are eligible for the sweep by default.
const DEFAULT_INACTIVE_TTL: Duration = Duration::from_secs(600);

/// Default number of entry-table shards.
const DEFAULT_NUM_SHARDS: usize = 16;

/// Builder for configuring and constructing a [`WriterPool`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use scrivano::{JournalWriterFactory, WriterPool};
///
/// let pool = WriterPool::builder(JournalWriterFactory::new("/var/lib/journals"))
///     .inactive_ttl(Duration::from_secs(30))
///     .num_shards(32)
///     .build();
/// # drop(pool);
/// ```
pub struct PoolBuilder<F> {
    factory: F,
    inactive_ttl: Duration,
    num_shards: usize,
}

impl<F: WriterFactory> PoolBuilder<F> {
    pub fn new(factory: F) -> Self {
        PoolBuilder {
            factory,
            inactive_ttl: DEFAULT_INACTIVE_TTL,
            num_shards: DEFAULT_NUM_SHARDS,
        }
    }

    /// How long a released writer may sit idle before a [`run`] sweep
    /// destroys it (default: 10 minutes).
    ///
    /// [`run`]: WriterPool::run
    pub fn inactive_ttl(mut self, ttl: Duration) -> Self {
        self.inactive_ttl = ttl;
        self
    }

    /// Set the number of entry-table shards (must be a power of two;
    /// default: 16).
    pub fn num_shards(mut self, n: usize) -> Self {
        assert!(n > 0 && n.is_power_of_two(), "num_shards must be a power of two");
        self.num_shards = n;
        self
    }

    pub fn build(self) -> WriterPool<F> {
        WriterPool::new(self.factory, self.inactive_ttl, self.num_shards)
    }
}
