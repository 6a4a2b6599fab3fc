//! Error types for lock operations

use tranca_store::StoreError;

/// Errors returned by [`LockHandle`](crate::LockHandle) operations.
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// The key is held by another lease. Expected under contention; the
    /// caller may retry later or pick another strategy.
    #[error("lock is held by another lease")]
    Held,

    /// `lock` was called on a handle that already holds the lock. A handle
    /// is per-attempt state; release it before locking again.
    #[error("handle already holds the lock")]
    AlreadyLocked,

    /// The coordination store failed. Propagated verbatim, never retried
    /// internally.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LockError {
    /// Whether this is the expected contention outcome rather than an
    /// infrastructure failure.
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Held)
    }
}
