//! Lease identifiers and the keepalive acknowledgment stream

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

/// Opaque identifier of a server-side lease.
///
/// Valid only between a successful grant and either an explicit revoke or
/// TTL expiry without renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(pub i64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // etcd convention: lease ids print as hex
        write!(f, "{:x}", self.0)
    }
}

/// One keepalive acknowledgment: the store has reset the lease's TTL
/// countdown.
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveAck {
    pub lease: LeaseId,
    /// The full TTL the lease was refreshed to.
    pub refreshed_ttl: Duration,
}

/// Stream of keepalive acknowledgments for one lease.
///
/// While the stream is held open the store keeps the lease alive. `recv`
/// returning `None` means the channel closed on the store side: the lease is
/// dead (revoked, or its TTL lapsed) and will not come back. Dropping the
/// stream stops renewal and lets the TTL run out.
#[derive(Debug)]
pub struct KeepAliveStream {
    rx: mpsc::Receiver<KeepAliveAck>,
}

impl KeepAliveStream {
    /// Wrap a receiver whose sender side is owned by a store backend.
    pub fn new(rx: mpsc::Receiver<KeepAliveAck>) -> Self {
        Self { rx }
    }

    /// Wait for the next acknowledgment, or `None` once the lease is dead.
    pub async fn recv(&mut self) -> Option<KeepAliveAck> {
        self.rx.recv().await
    }
}
