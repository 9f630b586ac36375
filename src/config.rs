//! Plain limiter settings.
//!
//! [`LimiterConfig`] holds the serializable half of a limiter's configuration. The hasher and
//! the store are code, not data, and are supplied to the builder separately:
//!
//! ```rust
//! use bucketeer::{hash, InMemoryStore, Limiter, LimiterConfig};
//! use std::time::Duration;
//!
//! let config = LimiterConfig::new("login", 5, Duration::from_secs(60))
//!     .with_back_offs(vec![Duration::from_millis(100), Duration::from_millis(200)]);
//! let limiter = Limiter::<String>::builder()
//!     .config(config)
//!     .hasher(hash::identity)
//!     .store(InMemoryStore::new())
//!     .build()
//!     .unwrap();
//! assert_eq!(limiter.limit(), 5);
//! ```
//!
//! With the `serde` feature durations are read and written as integer milliseconds:
//! `{"label": "login", "limit": 5, "reset_after": 60000, "back_offs": [100, 200]}`.

use std::time::Duration;

/// Serializable limiter settings; validated when handed to a builder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimiterConfig {
    /// Namespacing prefix of every bucket id.
    pub label: String,
    /// Tokens per window; 0 denies everything.
    pub limit: u64,
    /// Window length.
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub reset_after: Duration,
    /// Delay required after the n-th consumption; the last entry repeats.
    #[cfg_attr(feature = "serde", serde(default, with = "millis_seq"))]
    pub back_offs: Vec<Duration>,
}

impl LimiterConfig {
    pub fn new(label: impl Into<String>, limit: u64, reset_after: Duration) -> Self {
        Self { label: label.into(), limit, reset_after, back_offs: Vec::new() }
    }

    pub fn with_back_offs(mut self, back_offs: Vec<Duration>) -> Self {
        self.back_offs = back_offs;
        self
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
mod millis_seq {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ds: &[Duration], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(ds.len()))?;
        for d in ds {
            seq.serialize_element(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Duration>, D::Error> {
        Vec::<u64>::deserialize(d).map(|v| v.into_iter().map(Duration::from_millis).collect())
    }
}
