//! Per-key bucket handle and the consumption algorithm.
//!
//! Semantics of [`Bucket::consume`], evaluated against the handle's snapshot:
//! 1. If the window ended before now, reset the count (lazy reset, no timers).
//! 2. If the count reached the limit, reject until the window resets.
//! 3. If a back-off schedule applies, reject until `last_consumed_at + delay`, clamped to the
//!    window reset.
//! 4. Otherwise admit one token and persist with a conditional update.
//!
//! Only step 4 touches the store. A conflicting writer is detected there and reported as
//! [`Error::RevisionMismatch`]; the handle is then stale and must be re-acquired.
//!
//! Invariants:
//! - `remaining` in a rejection is `limit - consumed`, and 0 when the cap was hit.
//! - `try_after <= reset_at` for every rejection.
//! - The snapshot only takes the admitted state once the store accepted it.

use crate::error::{Error, RateLimitRejection, StoreError};
use crate::limiter::Limiter;
use crate::state::BucketState;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Handle bound to one key's state.
///
/// Calls through one handle are serialized by its lock. Different handles for the same key,
/// in this process or another, are reconciled only by the store's revision check.
pub struct Bucket<K: ?Sized> {
    limiter: Limiter<K>,
    id: String,
    state: Mutex<BucketState>,
}

impl<K: ?Sized> std::fmt::Debug for Bucket<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket").field("id", &self.id).field("limiter", &self.limiter).finish()
    }
}

impl<K: ?Sized> Bucket<K> {
    pub(crate) fn new(limiter: Limiter<K>, state: BucketState) -> Self {
        Self { limiter, id: state.id.clone(), state: Mutex::new(state) }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limiter(&self) -> &Limiter<K> {
        &self.limiter
    }

    /// Copy of the handle's current snapshot.
    pub async fn state(&self) -> BucketState {
        self.state.lock().await.clone()
    }

    /// Try to take one token.
    ///
    /// # Errors
    /// - [`Error::RateLimited`] when the cap or the back-off schedule denies this instant.
    /// - [`Error::RevisionMismatch`] when the stored record changed or vanished since this
    ///   handle loaded it.
    /// - [`Error::Store`] for any other store failure.
    pub async fn consume(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let cfg = &self.limiter.inner;
        let now = cfg.clock.now();

        if state.window_elapsed(cfg.reset_after, now) {
            trace!(target: "bucketeer::bucket", id = %self.id, "window elapsed, resetting");
            state.reset_window(now);
        }

        let reset_at = state.reset_at(cfg.reset_after);
        let consumed = state.consumed_token_count;

        if consumed >= cfg.limit {
            debug!(target: "bucketeer::bucket", id = %self.id, consumed, "limit reached");
            return Err(RateLimitRejection { remaining: 0, reset_at, try_after: reset_at }.into());
        }

        if let (Some(delay), Some(last)) = (cfg.back_off_after(consumed), state.last_consumed_at)
        {
            let try_after = last.checked_add(delay).map_or(reset_at, |t| t.min(reset_at));
            if try_after > now {
                debug!(
                    target: "bucketeer::bucket",
                    id = %self.id,
                    consumed,
                    delay = ?delay,
                    "backing off"
                );
                return Err(RateLimitRejection {
                    remaining: cfg.limit - consumed,
                    reset_at,
                    try_after,
                }
                .into());
            }
        }

        let mut next = state.clone();
        next.consumed_token_count += 1;
        next.last_consumed_at = Some(now);

        match cfg.store.update(&next).await {
            Ok(revision) => {
                next.revision = revision;
                *state = next;
                Ok(())
            }
            Err(StoreError::NotFound { id }) | Err(StoreError::RevisionMismatch { id, .. }) => {
                debug!(target: "bucketeer::bucket", id = %id, "stale bucket snapshot");
                Err(Error::RevisionMismatch { id })
            }
            Err(e) => Err(Error::Store(e)),
        }
    }
}
