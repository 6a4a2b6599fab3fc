//! In-process coordination store with real TTL expiry
//!
//! `MemoryStore` implements the four [`CoordinationStore`] primitives against
//! dashmap tables. It is the test backend and the embedded single-process
//! backend; it is not a replicated store.
//!
//! Expiry is enforced two ways: every access treats a lapsed lease as gone
//! (and a key bound to a lapsed lease as absent), and an optional background
//! sweeper physically purges lapsed records.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, Entry};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::StoreError;
use crate::lease::{KeepAliveAck, KeepAliveStream, LeaseId};
use crate::store::CoordinationStore;

/// Keepalive cadence: refresh every TTL/3, so a lease survives two missed
/// rounds before lapsing.
const KEEPALIVE_DIVISOR: u32 = 3;

/// Buffered acks per keepalive stream.
const ACK_CHANNEL_CAPACITY: usize = 4;

struct LeaseRecord {
    ttl: Duration,
    expires_at: Instant,
}

impl LeaseRecord {
    fn is_lapsed(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

struct KeyRecord {
    #[allow(dead_code)]
    value: Vec<u8>,
    lease: LeaseId,
    #[allow(dead_code)]
    create_revision: i64,
}

struct Shared {
    leases: DashMap<LeaseId, LeaseRecord>,
    keys: DashMap<String, KeyRecord>,
    revision: AtomicI64,
    next_lease: AtomicI64,
}

impl Shared {
    fn lease_live(&self, id: LeaseId) -> bool {
        let now = Instant::now();
        self.leases.get(&id).is_some_and(|rec| !rec.is_lapsed(now))
    }

    /// Remove a lease and every key bound to it.
    fn purge_lease(&self, id: LeaseId) {
        self.leases.remove(&id);
        self.keys.retain(|_, rec| rec.lease != id);
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let lapsed: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|entry| entry.is_lapsed(now))
            .map(|entry| *entry.key())
            .collect();
        for id in &lapsed {
            self.purge_lease(*id);
        }
        lapsed.len()
    }
}

/// In-process [`CoordinationStore`] backend.
pub struct MemoryStore {
    shared: Arc<Shared>,
    sweeper: Option<tokio::task::JoinHandle<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                leases: DashMap::new(),
                keys: DashMap::new(),
                revision: AtomicI64::new(0),
                next_lease: AtomicI64::new(1),
            }),
            sweeper: None,
        }
    }

    /// Start a background sweep that purges lapsed leases every `period` and
    /// publishes lease metrics.
    pub fn with_sweeper(mut self, period: Duration) -> Self {
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let swept = shared.sweep();
                if swept > 0 {
                    debug!(count = swept, "swept lapsed leases");
                    counter!("tranca_store_expired_leases_total").increment(swept as u64);
                }
                gauge!("tranca_store_live_leases").set(shared.leases.len() as f64);
            }
        });
        self.sweeper = Some(handle);
        self
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn grant(&self, ttl: Duration) -> Result<LeaseId, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }

        let id = LeaseId(self.shared.next_lease.fetch_add(1, Ordering::Relaxed));
        self.shared.leases.insert(
            id,
            LeaseRecord {
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );

        debug!(lease = %id, ?ttl, "granted lease");
        Ok(id)
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError> {
        let ttl = {
            let now = Instant::now();
            match self.shared.leases.get(&lease) {
                Some(rec) if !rec.is_lapsed(now) => rec.ttl,
                _ => return Err(StoreError::LeaseNotFound(lease)),
            }
        };

        let (tx, rx) = mpsc::channel(ACK_CHANNEL_CAPACITY);
        let shared = self.shared.clone();

        // Refresher task: resets the lease deadline every TTL/3 for as long
        // as both the lease and the client's stream are alive. Dropping the
        // sender closes the client's stream, which is the lease-death signal.
        tokio::spawn(async move {
            let period = (ttl / KEEPALIVE_DIVISOR).max(Duration::from_millis(1));
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let refreshed = {
                            let now = Instant::now();
                            match shared.leases.get_mut(&lease) {
                                Some(mut rec) if !rec.is_lapsed(now) => {
                                    rec.expires_at = now + rec.ttl;
                                    rec.ttl
                                }
                                // Revoked or lapsed: stop, closing the channel.
                                _ => break,
                            }
                        };
                        let ack = KeepAliveAck { lease, refreshed_ttl: refreshed };
                        if tx.send(ack).await.is_err() {
                            // Client dropped its stream; let the TTL run out.
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!(lease = %lease, "keepalive refresher stopped");
        });

        Ok(KeepAliveStream::new(rx))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: LeaseId,
    ) -> Result<bool, StoreError> {
        if !self.shared.lease_live(lease) {
            return Err(StoreError::LeaseNotFound(lease));
        }

        // The entry guard makes the compare-and-swap atomic per key.
        match self.shared.keys.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.shared.lease_live(occupied.get().lease) {
                    return Ok(false);
                }
                // The previous holder's lease lapsed; the key is logically
                // absent even though the sweeper has not run yet.
                let revision = self.shared.revision.fetch_add(1, Ordering::Relaxed) + 1;
                occupied.insert(KeyRecord {
                    value,
                    lease,
                    create_revision: revision,
                });
            }
            Entry::Vacant(vacant) => {
                let revision = self.shared.revision.fetch_add(1, Ordering::Relaxed) + 1;
                vacant.insert(KeyRecord {
                    value,
                    lease,
                    create_revision: revision,
                });
            }
        }

        debug!(%key, lease = %lease, "conditional write succeeded");
        Ok(true)
    }

    async fn revoke(&self, lease: LeaseId) -> Result<(), StoreError> {
        if self.shared.leases.remove(&lease).is_none() {
            return Err(StoreError::LeaseNotFound(lease));
        }
        self.shared.keys.retain(|_, rec| rec.lease != lease);

        debug!(lease = %lease, "revoked lease");
        Ok(())
    }
}
