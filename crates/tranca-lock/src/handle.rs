//! The lock handle: acquisition, background renewal, release

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use tranca_store::{CoordinationStore, KeepAliveStream, LeaseId};

use crate::error::LockError;

/// An exclusive lock over one coordination-store key.
///
/// A handle is per-attempt state: create it empty, call [`lock`], run the
/// critical section, call [`unlock`]. Independent handles (one per key) need
/// no client-side synchronization between them; all arbitration is delegated
/// to the store's atomic conditional write.
///
/// Dropping an acquired handle without calling [`unlock`] stops renewal and
/// abandons the lease to passive TTL expiry, as if the holder had crashed.
///
/// [`lock`]: LockHandle::lock
/// [`unlock`]: LockHandle::unlock
pub struct LockHandle<S: CoordinationStore> {
    store: Arc<S>,
    key: String,
    lease: Option<LeaseId>,
    stop_tx: Option<mpsc::Sender<()>>,
    renewal: Option<JoinHandle<()>>,
    acquired: bool,
}

impl<S: CoordinationStore> LockHandle<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lease: None,
            stop_tx: None,
            renewal: None,
            acquired: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The lease the lock is held under, while acquired.
    pub fn lease_id(&self) -> Option<LeaseId> {
        self.lease
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Try to acquire the lock, holding it under a lease with the given TTL.
    ///
    /// Non-blocking: returns [`LockError::Held`] immediately when another
    /// lease owns the key. On success a background task renews the lease
    /// until [`unlock`](LockHandle::unlock) or drop; see the crate docs for
    /// the silent-loss caveat when renewal cannot reach the store.
    pub async fn lock(&mut self, ttl: Duration) -> Result<(), LockError> {
        if self.acquired {
            return Err(LockError::AlreadyLocked);
        }

        let lease = self.store.grant(ttl).await?;

        // Renewal must be running before the conditional write, so the lease
        // cannot lapse between grant and write on a slow network.
        let stream = match self.store.keep_alive(lease).await {
            Ok(stream) => stream,
            Err(err) => {
                if let Err(revoke_err) = self.store.revoke(lease).await {
                    warn!(lease = %lease, error = %revoke_err,
                        "failed to revoke lease; it will lapse with its ttl");
                }
                return Err(err.into());
            }
        };
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let renewal = tokio::spawn(renewal_loop(self.key.clone(), lease, stream, stop_rx));

        match self.store.put_if_absent(&self.key, Vec::new(), lease).await {
            Ok(true) => {
                self.lease = Some(lease);
                self.stop_tx = Some(stop_tx);
                self.renewal = Some(renewal);
                self.acquired = true;
                debug!(key = %self.key, lease = %lease, "lock acquired");
                Ok(())
            }
            Ok(false) => {
                // Another lease owns the key. Tear down so this attempt does
                // not leak a lease that acquired nothing.
                self.teardown(lease, stop_tx, renewal).await;
                Err(LockError::Held)
            }
            Err(err) => {
                self.teardown(lease, stop_tx, renewal).await;
                Err(err.into())
            }
        }
    }

    /// Release the lock: stop renewal, then revoke the lease, which deletes
    /// the key with it and frees the resource immediately.
    ///
    /// If revocation fails the error is returned, but the lease still lapses
    /// passively once its TTL runs out, since renewal is already stopped.
    /// Calling `unlock` on a handle that holds nothing is a no-op.
    pub async fn unlock(&mut self) -> Result<(), LockError> {
        if !self.acquired {
            return Ok(());
        }

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(()).await;
        }
        if let Some(renewal) = self.renewal.take() {
            let _ = renewal.await;
        }
        self.acquired = false;

        if let Some(lease) = self.lease.take() {
            self.store.revoke(lease).await?;
            debug!(key = %self.key, lease = %lease, "lock released");
        }
        Ok(())
    }

    async fn teardown(&self, lease: LeaseId, stop_tx: mpsc::Sender<()>, renewal: JoinHandle<()>) {
        let _ = stop_tx.send(()).await;
        let _ = renewal.await;
        if let Err(err) = self.store.revoke(lease).await {
            warn!(lease = %lease, error = %err,
                "failed to revoke lease; it will lapse with its ttl");
        }
    }
}

impl<S: CoordinationStore> Drop for LockHandle<S> {
    fn drop(&mut self) {
        // Stop renewal only; drop cannot block on a revoke round-trip. The
        // lease lapses passively, exactly like a crashed holder.
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
    }
}

/// Background renewal: drain keepalive acknowledgments until the lease dies
/// or the handle asks it to stop.
async fn renewal_loop(
    key: String,
    lease: LeaseId,
    mut stream: KeepAliveStream,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            ack = stream.recv() => match ack {
                Some(ack) => {
                    trace!(key = %key, lease = %ack.lease, "keepalive acknowledged");
                }
                None => {
                    // Server-side signal that the lease is gone. The lock is
                    // silently lost; there is no one to report it to here.
                    warn!(key = %key, lease = %lease,
                        "keepalive channel closed; lease lapsed and the lock is no longer held");
                    break;
                }
            },
            _ = stop_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tranca_store::MemoryStore;

    const TTL: Duration = Duration::from_millis(300);

    #[tokio::test]
    async fn lock_twice_on_one_handle_errors() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let mut handle = LockHandle::new(store, "res");

        handle.lock(TTL).await?;
        let err = handle.lock(TTL).await.unwrap_err();
        assert!(matches!(err, LockError::AlreadyLocked));

        handle.unlock().await?;
        Ok(())
    }

    #[tokio::test]
    async fn unlock_without_lock_is_a_noop() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let mut handle = LockHandle::new(store, "res");
        handle.unlock().await?;
        Ok(())
    }

    #[tokio::test]
    async fn lease_is_exposed_only_while_held() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let mut handle = LockHandle::new(store, "res");
        assert!(handle.lease_id().is_none());
        assert!(!handle.is_acquired());

        handle.lock(TTL).await?;
        assert!(handle.lease_id().is_some());
        assert!(handle.is_acquired());

        handle.unlock().await?;
        assert!(handle.lease_id().is_none());
        assert!(!handle.is_acquired());
        Ok(())
    }

    #[tokio::test]
    async fn zero_ttl_is_an_infrastructure_error() {
        let store = Arc::new(MemoryStore::new());
        let mut handle = LockHandle::new(store, "res");
        let err = handle.lock(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::Store(_)));
        assert!(!err.is_held());
    }
}
