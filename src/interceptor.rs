//! Close interception — the protocol by which the pool, not the writer,
//! owns the writer's lifecycle.
//!
//! The pool installs a [`CloseInterceptor`] on every writer it caches.
//! When client code calls [`PoolableWriter::close`], the writer first asks
//! the interceptor whether to proceed: a `false` answer means the pool took
//! the writer back into its cache and the handle must remain fully usable,
//! a `true` answer authorizes physical destruction. Detaching the hook
//! reverts the writer to self-owned, so `close` destroys it directly.
//!
//! The hook is held as a [`Weak`] reference: a pool that is dropped without
//! ever being closed simply disappears from its writers, which then close
//! themselves normally.

use std::sync::{Arc, Weak};

use crate::error::WriterError;

// ---------------------------------------------------------------------------
// CloseInterceptor
// ---------------------------------------------------------------------------

/// Decides whether a writer's `close()` may proceed to physical destruction.
pub trait CloseInterceptor: Send + Sync {
    /// Returns `true` to authorize destruction, `false` to suppress it.
    ///
    /// After a `false` answer the writer must behave as if `close()` had
    /// never been called.
    fn can_close(&self, writer: &dyn PoolableWriter) -> bool;
}

// ---------------------------------------------------------------------------
// PoolableWriter
// ---------------------------------------------------------------------------

/// The contract a writer must satisfy to be managed by the pool.
pub trait PoolableWriter: Send + Sync + 'static {
    /// Stable name of the journal this writer appends to.
    fn name(&self) -> &str;

    /// The currently installed close hook, if the pool is still alive.
    fn interceptor(&self) -> Option<Arc<dyn CloseInterceptor>>;

    /// Installs `hook`; subsequent `close` calls consult it.
    fn install_close_interceptor(&self, hook: Weak<dyn CloseInterceptor>);

    /// Detaches the hook; the writer reverts to self-owned.
    fn clear_close_interceptor(&self);

    /// Physically closes the writer, releasing its underlying resources.
    /// Must be idempotent: at most one call performs the destruction.
    fn destroy(&self) -> Result<(), WriterError>;

    /// Releases the writer.
    ///
    /// With an interceptor installed, this hands the writer back to its
    /// pool and the underlying resources stay open for the next acquirer.
    /// Without one — or when the pool authorizes it during shutdown — the
    /// writer is physically destroyed.
    fn close(&self) -> Result<(), WriterError>
    where
        Self: Sized,
    {
        match self.interceptor() {
            Some(hook) if !hook.can_close(self) => Ok(()),
            _ => self.destroy(),
        }
    }
}
