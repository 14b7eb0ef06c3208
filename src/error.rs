use std::sync::Arc;

// ---------------------------------------------------------------------------
// WriterError
// ---------------------------------------------------------------------------

/// Errors raised by journal writers and the base factory.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// I/O failure while opening, appending to, or closing a segment.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The journal name cannot be used as a segment file name.
    #[error("invalid journal name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A single record may not exceed the 4-byte length frame.
    #[error("record of {len} bytes exceeds the frame limit")]
    RecordTooLarge {
        /// Size of the rejected payload.
        len: usize,
    },

    /// The writer has already been physically closed.
    #[error("journal writer '{0}' is closed")]
    Closed(String),
}

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

/// Errors returned by [`WriterPool`](crate::WriterPool) operations.
///
/// `Closed` is terminal; `WriterBusy` and `JournalLocked` are transient and
/// may be retried after the owning thread releases or unlocks;
/// `ConstructionFailed` repeats deterministically until the failed slot is
/// swept out.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool has been closed; no further writers will be issued.
    #[error("writer pool is closed")]
    Closed,

    /// The writer is exclusively held by another thread.
    #[error("writer for journal '{name}' is owned by thread {owner}")]
    WriterBusy {
        /// Journal name.
        name: String,
        /// Id of the owning thread.
        owner: u64,
    },

    /// The journal is administratively locked.
    #[error("journal '{name}' is locked")]
    JournalLocked {
        /// Journal name.
        name: String,
    },

    /// The base factory failed to construct the writer. The same failure is
    /// reported to every acquirer of the slot until the sweep removes it.
    #[error("cannot create writer for journal '{name}'")]
    ConstructionFailed {
        /// Journal name.
        name: String,
        /// The factory's error, shared across racing acquirers.
        source: Arc<WriterError>,
    },

    /// Programmer error, e.g. unlocking a journal whose writer is still
    /// checked out.
    #[error("illegal state for journal '{name}': {reason}")]
    IllegalState {
        /// Journal name.
        name: String,
        /// What was violated.
        reason: &'static str,
    },
}
