mod memory;
mod types;
pub use memory::*;
pub use types::*;

#[cfg(test)]
mod memory_test;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::StoreError;

/// Capability surface of the replicated key-value store every coordination
/// primitive builds on: ordered range reads, If/Then transactions,
/// TTL leases and change watches.
///
/// Implementations must be linearizable: a transaction whose compares held
/// at commit time observes every previously committed mutation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    /// Ordered read of one key, or of every key under a prefix.
    async fn get(
        &self,
        key: &str,
        options: GetOptions,
    ) -> std::result::Result<Vec<KeyValue>, StoreError>;

    /// Atomic compare-and-swap transaction.
    async fn txn(
        &self,
        request: TxnRequest,
    ) -> std::result::Result<TxnResponse, StoreError>;

    /// Creates a lease; keys put with it attached are deleted by the store
    /// once `ttl` elapses without a keep-alive.
    async fn grant(
        &self,
        ttl: Duration,
    ) -> std::result::Result<LeaseId, StoreError>;

    /// Pushes the lease's deadline out by one full TTL.
    async fn keep_alive_once(
        &self,
        lease: LeaseId,
    ) -> std::result::Result<(), StoreError>;

    /// Drops the lease and immediately deletes every key attached to it.
    async fn revoke(
        &self,
        lease: LeaseId,
    ) -> std::result::Result<(), StoreError>;

    /// Opens a raw watch stream on a key or key prefix, starting from the
    /// store's current state.
    async fn watch(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> std::result::Result<WatchSubscription, StoreError>;
}
