//! Error types for limiters, buckets and stores
use std::time::{Duration, SystemTime};

/// Boxed error used for opaque backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A consumption was denied at this instant.
///
/// Not exceptional: callers are expected to wait until [`try_after`](Self::try_after) or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRejection {
    /// Tokens still available in the current window (0 when the cap was hit).
    pub remaining: u64,
    /// When the current window ends and the token count resets.
    pub reset_at: SystemTime,
    /// Earliest instant at which a retry can be admitted. Never later than `reset_at`.
    pub try_after: SystemTime,
}

impl RateLimitRejection {
    /// How long to wait from `now` before retrying; zero if `try_after` already passed.
    pub fn retry_after(&self, now: SystemTime) -> Duration {
        self.try_after.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// True if the window cap (not a back-off delay) caused the rejection.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl std::fmt::Display for RateLimitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "too many requests, try after {:?}", self.retry_after(SystemTime::now()))
    }
}

impl std::error::Error for RateLimitRejection {}

/// Raw signals reported by a [`Store`](crate::store::Store) backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No record exists for the id.
    #[error("bucket not found: {id}")]
    NotFound { id: String },
    /// A record with the id already exists.
    #[error("bucket already exists: {id}")]
    AlreadyExists { id: String },
    /// The stored revision differs from the one the writer read.
    #[error("bucket revision mismatch for {id} (expected {expected}, stored {found})")]
    RevisionMismatch { id: String, expected: u64, found: u64 },
    /// Any other backend failure (timeouts, connectivity, encoding).
    #[error("store backend: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Wrap an arbitrary backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Backend(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_revision_mismatch(&self) -> bool {
        matches!(self, Self::RevisionMismatch { .. })
    }
}

/// Errors produced when validating limiter configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("label cannot be empty")]
    EmptyLabel,
    #[error("reset_after must be > 0")]
    ZeroResetAfter,
    #[error("hasher must be set")]
    MissingHasher,
    #[error("store must be set")]
    MissingStore,
    /// The back-off schedule must stay strictly shorter than the limit.
    #[error("back_offs length must be < limit (got {back_offs} back-offs, limit {limit})")]
    TooManyBackOffs { back_offs: usize, limit: u64 },
}

/// Errors returned from [`Limiter::bucket`](crate::Limiter::bucket) and
/// [`Bucket::consume`](crate::Bucket::consume).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The consumption was denied; see the rejection for when to retry.
    #[error(transparent)]
    RateLimited(#[from] RateLimitRejection),
    /// The handle's snapshot is stale. Discard it and acquire a fresh bucket.
    #[error("bucket revision mismatch: {id}")]
    RevisionMismatch { id: String },
    /// The store failed for a reason unrelated to concurrency.
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    pub fn is_revision_mismatch(&self) -> bool {
        matches!(self, Self::RevisionMismatch { .. })
    }

    /// Borrow the rejection details if this is a rate-limit denial.
    pub fn rejection(&self) -> Option<&RateLimitRejection> {
        match self {
            Self::RateLimited(r) => Some(r),
            _ => None,
        }
    }

    /// Get the store error if the failure came from the backend.
    pub fn into_store_error(self) -> Option<StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}
