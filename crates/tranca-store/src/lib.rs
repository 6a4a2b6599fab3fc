//! Tranca Store - coordination-store primitives
//!
//! This crate provides:
//! - The [`CoordinationStore`] trait: the four operations a lock client
//!   consumes (lease grant, keepalive, conditional write, lease revoke)
//! - Lease types: [`LeaseId`], [`KeepAliveAck`], [`KeepAliveStream`]
//! - [`MemoryStore`]: an in-process backend with real TTL expiry, used for
//!   tests and for single-process embedding

pub mod error;
pub mod lease;
pub mod memory;
pub mod store;

// Re-exports for convenience
pub use error::StoreError;
pub use lease::{KeepAliveAck, KeepAliveStream, LeaseId};
pub use memory::MemoryStore;
pub use store::CoordinationStore;
