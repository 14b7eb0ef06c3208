//! A caching pool of exclusive append-only journal writers.
//!
//! Opening a journal writer pays for file handles and metadata setup on
//! every call. [`WriterPool`] amortizes that cost by keeping released
//! writers alive across client sessions while enforcing the storage
//! engine's fundamental rule: **a journal has at most one writer at any
//! moment**.
//!
//! Ownership transfer is lock-free — each pooled slot carries an atomic
//! owner word claimed and released by compare-and-swap, so the hot path
//! never takes a pool-wide lock. Writers are handed back through close
//! interception: calling [`close`] on a pooled writer returns it to the
//! pool instead of destroying it. Idle writers are reclaimed by the
//! cooperative [`run`] sweep once they outlive the configured TTL, and
//! [`WriterPool::close`] drains the pool, deferring writers still checked
//! out to their holders' eventual `close`.
//!
//! # Example
//! ```no_run
//! use scrivano::{JournalMetadata, JournalWriterFactory, PoolableWriter, WriterPool};
//!
//! let factory = JournalWriterFactory::new("/var/lib/journals");
//! let pool = WriterPool::builder(factory).build();
//!
//! let meta = JournalMetadata::new("trades")?;
//! let writer = pool.writer(&meta)?;
//! writer.append(b"record")?;
//! writer.commit()?;
//! writer.close()?; // back into the pool, still open
//! # pool.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`close`]: PoolableWriter::close
//! [`run`]: WriterPool::run

mod builder;
mod entry;
mod error;
mod factory;
mod journal;
mod metrics;
mod pool;
mod table;
pub mod interceptor;

pub use builder::PoolBuilder;
pub use error::{PoolError, WriterError};
pub use factory::{JournalMetadata, JournalWriterFactory, WriterFactory};
pub use interceptor::{CloseInterceptor, PoolableWriter};
pub use journal::JournalWriter;
pub use metrics::PoolMetrics;
pub use pool::WriterPool;
