//! Persistence contract for bucket state.
//!
//! A [`Store`] holds one [`BucketState`] per bucket id and guarantees two atomic operations:
//! insert-if-absent ([`Store::create`]) and replace-if-revision-matches ([`Store::update`]).
//! Nothing else is required from a backend; the limiter never locks across a
//! read-modify-write, it relies on the update check to detect a conflicting writer.
//!
//! Backends can be anything with a conditional write: the bundled [`InMemoryStore`], a
//! key-value store with compare-and-swap, or a SQL table updated with
//! `... WHERE id = $1 AND revision = $2`.
//!
//! Cancellation and timeouts are the caller's: wrap the call in `tokio::time::timeout` or drop
//! the future.

use crate::error::StoreError;
use crate::state::BucketState;
use async_trait::async_trait;

pub mod memory;
pub use memory::InMemoryStore;

/// Storage backend for bucket state with optimistic concurrency.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Fetch the state stored under `id`.
    ///
    /// Returns [`StoreError::NotFound`] if no record exists.
    async fn get(&self, id: &str) -> Result<BucketState, StoreError>;

    /// Insert `state` only if no record with `state.id` exists.
    ///
    /// Returns [`StoreError::AlreadyExists`] otherwise.
    async fn create(&self, state: &BucketState) -> Result<(), StoreError>;

    /// Replace the record for `state.id` only if its stored revision equals `state.revision`.
    ///
    /// On success the stored record carries `state.revision + 1`, which is returned.
    /// Returns [`StoreError::NotFound`] if the record is absent and
    /// [`StoreError::RevisionMismatch`] if another writer got there first. Must never
    /// overwrite silently.
    async fn update(&self, state: &BucketState) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> Store for std::sync::Arc<S>
where
    S: Store + ?Sized,
{
    async fn get(&self, id: &str) -> Result<BucketState, StoreError> {
        (**self).get(id).await
    }

    async fn create(&self, state: &BucketState) -> Result<(), StoreError> {
        (**self).create(state).await
    }

    async fn update(&self, state: &BucketState) -> Result<u64, StoreError> {
        (**self).update(state).await
    }
}
