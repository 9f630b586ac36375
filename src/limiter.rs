//! Limiter configuration and bucket acquisition.
//!
//! A [`Limiter`] is built once and then hands out [`Bucket`] handles, one per key. Acquiring a
//! bucket reads the key's state from the store, creating it on first use.
//!
//! Semantics:
//! - Bucket ids are `label:hash(key)`.
//! - Losing a creation race surfaces as [`Error::RevisionMismatch`]; call
//!   [`Limiter::bucket`] again to read the winner's record.
//! - Nothing is retried internally.
//!
//! Example
//! ```rust
//! use bucketeer::{hash, InMemoryStore, Limiter};
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let limiter = Limiter::<String>::builder()
//!     .label("login")
//!     .limit(3)
//!     .reset_after(Duration::from_secs(60))
//!     .hasher(hash::identity)
//!     .store(InMemoryStore::new())
//!     .build()
//!     .unwrap();
//!
//! let bucket = limiter.bucket(&"alice".to_string()).await.unwrap();
//! for _ in 0..3 {
//!     bucket.consume().await.unwrap();
//! }
//! assert!(bucket.consume().await.unwrap_err().is_rate_limited());
//! # });
//! ```

use crate::bucket::Bucket;
use crate::clock::{Clock, SystemClock};
use crate::config::LimiterConfig;
use crate::error::{ConfigError, Error, StoreError};
use crate::state::BucketState;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Key-to-string function used to build bucket ids.
pub type Hasher<K> = Arc<dyn Fn(&K) -> String + Send + Sync>;

pub(crate) struct LimiterInner<K: ?Sized> {
    pub(crate) label: String,
    pub(crate) limit: u64,
    pub(crate) reset_after: Duration,
    pub(crate) back_offs: Vec<Duration>,
    pub(crate) hasher: Hasher<K>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<K: ?Sized> LimiterInner<K> {
    /// Delay required after `consumed` tokens, if the schedule applies.
    ///
    /// The schedule is indexed by tokens already spent; once exhausted its last entry repeats.
    pub(crate) fn back_off_after(&self, consumed: u64) -> Option<Duration> {
        if consumed == 0 || self.back_offs.is_empty() {
            return None;
        }
        let last = self.back_offs.len() - 1;
        let idx = usize::try_from(consumed - 1).unwrap_or(usize::MAX).min(last);
        Some(self.back_offs[idx])
    }
}

/// Windowed token limiter over keys of type `K`.
///
/// Immutable after construction. Clones share configuration and store via `Arc`.
pub struct Limiter<K: ?Sized> {
    pub(crate) inner: Arc<LimiterInner<K>>,
}

impl<K: ?Sized> Clone for Limiter<K> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K: ?Sized> std::fmt::Debug for Limiter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("label", &self.inner.label)
            .field("limit", &self.inner.limit)
            .field("reset_after", &self.inner.reset_after)
            .field("back_offs", &self.inner.back_offs)
            .field("hasher", &"<hasher>")
            .field("store", &self.inner.store)
            .field("clock", &self.inner.clock)
            .finish()
    }
}

impl<K: ?Sized> Limiter<K> {
    /// Construct a new builder. Label, limit, window, hasher and store must all be set.
    pub fn builder() -> LimiterBuilder<K> {
        LimiterBuilder::new()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn limit(&self) -> u64 {
        self.inner.limit
    }

    pub fn reset_after(&self) -> Duration {
        self.inner.reset_after
    }

    pub fn back_offs(&self) -> &[Duration] {
        &self.inner.back_offs
    }

    /// The store id used for `key`.
    pub fn bucket_id(&self, key: &K) -> String {
        format!("{}:{}", self.inner.label, (self.inner.hasher)(key))
    }

    /// Load (or create) the bucket for `key`.
    ///
    /// # Errors
    /// - [`Error::RevisionMismatch`] if another caller created the record between our read and
    ///   our create. Acquire again.
    /// - [`Error::Store`] for any other store failure, including a failed create.
    pub async fn bucket(&self, key: &K) -> Result<Bucket<K>, Error> {
        let id = self.bucket_id(key);
        let store = &self.inner.store;

        let state = match store.get(&id).await {
            Ok(state) => state,
            Err(StoreError::NotFound { .. }) => {
                let state = BucketState::new(id, self.inner.clock.now());
                match store.create(&state).await {
                    Ok(()) => {
                        debug!(target: "bucketeer::limiter", id = %state.id, "created bucket");
                        state
                    }
                    Err(StoreError::AlreadyExists { id }) => {
                        debug!(target: "bucketeer::limiter", id = %id, "lost bucket creation race");
                        return Err(Error::RevisionMismatch { id });
                    }
                    Err(e) => return Err(Error::Store(e)),
                }
            }
            Err(e) => return Err(Error::Store(e)),
        };

        Ok(Bucket::new(self.clone(), state))
    }
}

/// Builder for [`Limiter`].
pub struct LimiterBuilder<K: ?Sized> {
    label: String,
    limit: u64,
    reset_after: Duration,
    back_offs: Vec<Duration>,
    hasher: Option<Hasher<K>>,
    store: Option<Arc<dyn Store>>,
    clock: Arc<dyn Clock>,
}

impl<K: ?Sized> Default for LimiterBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized> LimiterBuilder<K> {
    pub fn new() -> Self {
        Self {
            label: String::new(),
            limit: 0,
            reset_after: Duration::ZERO,
            back_offs: Vec::new(),
            hasher: None,
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Namespacing prefix of bucket ids. Must be non-empty.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Tokens per window. 0 denies every consumption.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Window length. Must be > 0.
    pub fn reset_after(mut self, window: Duration) -> Self {
        self.reset_after = window;
        self
    }

    /// Delays between consumptions; must be shorter than the limit.
    pub fn back_offs(mut self, back_offs: impl Into<Vec<Duration>>) -> Self {
        self.back_offs = back_offs.into();
        self
    }

    /// Take label, limit, window and back-offs from a [`LimiterConfig`].
    pub fn config(mut self, config: LimiterConfig) -> Self {
        self.label = config.label;
        self.limit = config.limit;
        self.reset_after = config.reset_after;
        self.back_offs = config.back_offs;
        self
    }

    /// Key-to-string function; see [`crate::hash`] for ready-made ones.
    pub fn hasher<F>(mut self, hasher: F) -> Self
    where
        F: Fn(&K) -> String + Send + Sync + 'static,
    {
        self.hasher = Some(Arc::new(hasher));
        self
    }

    /// Persistence backend.
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: Store + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate and build the limiter.
    pub fn build(self) -> Result<Limiter<K>, ConfigError> {
        if self.label.is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if self.reset_after.is_zero() {
            return Err(ConfigError::ZeroResetAfter);
        }
        let hasher = self.hasher.ok_or(ConfigError::MissingHasher)?;
        if !self.back_offs.is_empty() && self.back_offs.len() as u64 >= self.limit {
            return Err(ConfigError::TooManyBackOffs {
                back_offs: self.back_offs.len(),
                limit: self.limit,
            });
        }
        let store = self.store.ok_or(ConfigError::MissingStore)?;

        Ok(Limiter {
            inner: Arc::new(LimiterInner {
                label: self.label,
                limit: self.limit,
                reset_after: self.reset_after,
                back_offs: self.back_offs,
                hasher,
                store,
                clock: self.clock,
            }),
        })
    }
}
