#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # bucketeer
//!
//! Windowed token buckets with back-off schedules, persisted through pluggable stores that use
//! optimistic concurrency.
//!
//! ## Features
//!
//! - **Fixed windows**: up to `limit` tokens per key per `reset_after`, reset lazily
//! - **Back-off schedules**: growing delays between consumptions inside a window
//! - **Pluggable stores**: anything with conditional create and revision-checked update
//! - **Conflict detection** instead of cross-process locking
//! - **Tower middleware** keyed by request
//!
//! ## Quick Start
//!
//! ```rust
//! use bucketeer::{hash, Error, InMemoryStore, Limiter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = Limiter::<str>::builder()
//!         .label("login")
//!         .limit(5)
//!         .reset_after(Duration::from_secs(60))
//!         .back_offs(vec![Duration::from_millis(100), Duration::from_millis(200)])
//!         .hasher(hash::identity)
//!         .store(InMemoryStore::new())
//!         .build()
//!         .unwrap();
//!
//!     let bucket = limiter.bucket("alice").await.unwrap();
//!     match bucket.consume().await {
//!         Ok(()) => { /* allowed */ }
//!         Err(Error::RateLimited(rejection)) => {
//!             let _retry_at = rejection.try_after;
//!         }
//!         Err(Error::RevisionMismatch { .. }) => { /* re-acquire the bucket and retry */ }
//!         Err(other) => panic!("store failure: {other}"),
//!     }
//! }
//! ```

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod limiter;
pub mod middleware;
pub mod state;
pub mod store;

// Re-exports
pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LimiterConfig;
pub use error::{BoxError, ConfigError, Error, RateLimitRejection, StoreError};
pub use limiter::{Hasher, Limiter, LimiterBuilder};
pub use middleware::{ConsumeLayer, ConsumeService, MiddlewareError};
pub use state::BucketState;
pub use store::{InMemoryStore, Store};
