//! Persisted per-key bucket state.

use std::time::{Duration, SystemTime};

/// Revision assigned to a freshly created bucket.
pub const INITIAL_REVISION: u64 = 1;

/// Snapshot of one key's consumption history, as stored by a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketState {
    /// `label:hash(key)`. Never changes once assigned.
    pub id: String,
    /// Concurrency token compared by the store on update.
    pub revision: u64,
    /// Start of the current counting window.
    pub last_reset_at: SystemTime,
    /// Tokens consumed in the current window.
    pub consumed_token_count: u64,
    /// Most recent admitted consumption; `None` after a window reset.
    pub last_consumed_at: Option<SystemTime>,
}

impl BucketState {
    /// Fresh state for a bucket that has never been consumed.
    pub fn new(id: impl Into<String>, now: SystemTime) -> Self {
        Self {
            id: id.into(),
            revision: INITIAL_REVISION,
            last_reset_at: now,
            consumed_token_count: 0,
            last_consumed_at: None,
        }
    }

    /// End of the window that started at `last_reset_at`.
    ///
    /// Saturates to a far-future instant when the sum is not representable.
    pub fn reset_at(&self, reset_after: Duration) -> SystemTime {
        saturating_add(self.last_reset_at, reset_after)
    }

    /// Whether the window has elapsed strictly before `now`.
    pub(crate) fn window_elapsed(&self, reset_after: Duration, now: SystemTime) -> bool {
        self.reset_at(reset_after) < now
    }

    pub(crate) fn reset_window(&mut self, now: SystemTime) {
        self.consumed_token_count = 0;
        self.last_reset_at = now;
        self.last_consumed_at = None;
    }
}

/// `time + by`, or the latest instant reachable by halving `by` when that overflows.
pub(crate) fn saturating_add(time: SystemTime, mut by: Duration) -> SystemTime {
    loop {
        if let Some(end) = time.checked_add(by) {
            return end;
        }
        by /= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_empty_at_initial_revision() {
        let now = SystemTime::now();
        let state = BucketState::new("login:alice", now);
        assert_eq!(state.revision, INITIAL_REVISION);
        assert_eq!(state.consumed_token_count, 0);
        assert_eq!(state.last_reset_at, now);
        assert!(state.last_consumed_at.is_none());
    }

    #[test]
    fn window_elapses_strictly_after_reset_at() {
        let now = SystemTime::now();
        let window = Duration::from_secs(60);
        let state = BucketState::new("x", now);
        assert!(!state.window_elapsed(window, now + window));
        assert!(state.window_elapsed(window, now + window + Duration::from_nanos(1)));
    }

    #[test]
    fn reset_window_clears_consumption() {
        let start = SystemTime::now();
        let mut state = BucketState::new("x", start);
        state.consumed_token_count = 4;
        state.last_consumed_at = Some(start);

        let later = start + Duration::from_secs(90);
        state.reset_window(later);
        assert_eq!(state.consumed_token_count, 0);
        assert_eq!(state.last_reset_at, later);
        assert_eq!(state.last_consumed_at, None);
    }

    #[test]
    fn reset_at_saturates_instead_of_overflowing() {
        let now = SystemTime::now();
        let state = BucketState::new("x", now);
        let end = state.reset_at(Duration::MAX);
        assert!(end > now + Duration::from_secs(100 * 365 * 24 * 3600));
        assert_eq!(end, state.reset_at(Duration::MAX));
        assert!(!state.window_elapsed(Duration::MAX, now + Duration::from_secs(3600)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_uses_snake_case_field_names() {
        let state = BucketState::new("login:alice", SystemTime::UNIX_EPOCH);
        let v = serde_json::to_value(&state).unwrap();
        for field in
            ["id", "revision", "last_reset_at", "consumed_token_count", "last_consumed_at"]
        {
            assert!(v.get(field).is_some(), "missing {field}");
        }
        assert!(v["last_consumed_at"].is_null());
    }
}
