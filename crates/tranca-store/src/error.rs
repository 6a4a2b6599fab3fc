//! Error types for coordination-store operations

use std::time::Duration;

use crate::lease::LeaseId;

/// Errors returned by [`CoordinationStore`](crate::CoordinationStore)
/// operations.
///
/// All of these are infrastructure-level: contention on a key is not an
/// error at this layer, it is the `Ok(false)` outcome of a conditional write.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("invalid lease ttl: {0:?}")]
    InvalidTtl(Duration),

    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
