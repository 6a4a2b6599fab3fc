//! Tranca Lock - lease-based distributed mutual exclusion
//!
//! A [`LockHandle`] binds one coordination-store client to one lock key and
//! composes three store primitives: lease grant, a keepalive stream, and an
//! atomic put-if-absent write. Acquisition is non-blocking: it either
//! succeeds immediately or fails with [`LockError::Held`].
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use tranca_lock::LockHandle;
//! use tranca_store::MemoryStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let mut lock = LockHandle::new(store, "jobs/reindex");
//!
//! lock.lock(Duration::from_secs(5)).await?;
//! // critical section
//! lock.unlock().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Caveat: lease-based exclusion is best-effort
//!
//! If the holder's process is paused for longer than the TTL, or a partition
//! stops keepalive delivery, the lease lapses server-side and another client
//! can acquire the key while the original holder still believes it owns it.
//! No error is raised at that moment; the background renewal task simply
//! stops. Choose a TTL comfortably larger than any expected scheduling delay,
//! and treat "lock believed held" as advisory unless your writes are fenced
//! by some other means.

pub mod error;
pub mod handle;

// Re-exports for convenience
pub use error::LockError;
pub use handle::LockHandle;
