//! The coordination-store trait consumed by the lock client

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::lease::{KeepAliveStream, LeaseId};

/// The four primitives a lock client consumes from a linearizable
/// coordination store.
///
/// Implementations must evaluate `put_if_absent` atomically: of any set of
/// concurrent writes against the same absent key, exactly one succeeds. All
/// mutual-exclusion arbitration is delegated to this guarantee; clients
/// perform no local arbitration.
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Create a lease with a server-enforced TTL.
    async fn grant(&self, ttl: Duration) -> Result<LeaseId, StoreError>;

    /// Open the keepalive stream for a granted lease.
    ///
    /// While the stream is held open the store keeps refreshing the lease;
    /// dropping the stream lets the TTL run out.
    async fn keep_alive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError>;

    /// Conditional write: put `value` under `key`, bound to `lease`, only if
    /// the key does not currently exist. Returns whether the write landed;
    /// `Ok(false)` means the key is already held and nothing was written.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: LeaseId,
    ) -> Result<bool, StoreError>;

    /// Delete a lease and, transitively, every key bound to it.
    async fn revoke(&self, lease: LeaseId) -> Result<(), StoreError>;
}
