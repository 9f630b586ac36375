//! Tower middleware that consumes one token per request.
//!
//! The layer extracts a key from each request, acquires that key's bucket and consumes a token
//! before calling the inner service. A stale bucket ([`Error::RevisionMismatch`]) is
//! re-acquired up to `attempts` times in total; every other failure is returned as is.
//!
//! ```rust
//! use bucketeer::{hash, middleware::ConsumeLayer, InMemoryStore, Limiter};
//! use std::time::Duration;
//! use tower::{service_fn, Layer, ServiceExt};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let limiter = Limiter::<String>::builder()
//!     .label("api")
//!     .limit(1)
//!     .reset_after(Duration::from_secs(60))
//!     .hasher(hash::identity)
//!     .store(InMemoryStore::new())
//!     .build()
//!     .unwrap();
//! let layer = ConsumeLayer::new(limiter, |user: &String| user.clone());
//! let svc = layer.layer(service_fn(|user: String| async move {
//!     Ok::<_, std::io::Error>(format!("hello {user}"))
//! }));
//!
//! assert!(svc.clone().oneshot("bob".to_string()).await.is_ok());
//! assert!(svc.oneshot("bob".to_string()).await.unwrap_err().is_rate_limited());
//! # });
//! ```

use crate::error::{Error, RateLimitRejection};
use crate::limiter::Limiter;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Default total number of acquire-and-consume attempts per request.
pub const DEFAULT_ATTEMPTS: usize = 3;

/// Errors returned by [`ConsumeService`].
#[derive(thiserror::Error, Debug)]
pub enum MiddlewareError<E> {
    /// The request's bucket denied it.
    #[error(transparent)]
    RateLimited(RateLimitRejection),
    /// The limiter or its store failed, or the bucket stayed stale for every attempt.
    #[error("limiter: {0}")]
    Limiter(#[source] Error),
    /// The inner service failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> MiddlewareError<E> {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// A layer that consumes a token from a per-request bucket.
pub struct ConsumeLayer<K, F> {
    limiter: Limiter<K>,
    key_fn: Arc<F>,
    attempts: usize,
}

impl<K, F> Clone for ConsumeLayer<K, F> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), key_fn: self.key_fn.clone(), attempts: self.attempts }
    }
}

impl<K, F> ConsumeLayer<K, F> {
    /// Create a layer that keys requests with `key_fn`.
    pub fn new(limiter: Limiter<K>, key_fn: F) -> Self {
        Self { limiter, key_fn: Arc::new(key_fn), attempts: DEFAULT_ATTEMPTS }
    }

    /// Total attempts when the bucket turns out stale; values below 1 are treated as 1.
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

impl<S, K, F> Layer<S> for ConsumeLayer<K, F> {
    type Service = ConsumeService<S, K, F>;

    fn layer(&self, service: S) -> Self::Service {
        ConsumeService {
            inner: service,
            limiter: self.limiter.clone(),
            key_fn: self.key_fn.clone(),
            attempts: self.attempts,
        }
    }
}

/// Middleware service produced by [`ConsumeLayer`].
pub struct ConsumeService<S, K, F> {
    inner: S,
    limiter: Limiter<K>,
    key_fn: Arc<F>,
    attempts: usize,
}

impl<S: Clone, K, F> Clone for ConsumeService<S, K, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            key_fn: self.key_fn.clone(),
            attempts: self.attempts,
        }
    }
}

impl<S, K, F, Req> Service<Req> for ConsumeService<S, K, F>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    K: Send + Sync + 'static,
    F: Fn(&Req) -> K + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = MiddlewareError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(MiddlewareError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Take the service that was driven to readiness and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();
        let attempts = self.attempts;
        let key = (self.key_fn)(&req);

        Box::pin(async move {
            let mut attempt = 1;
            loop {
                let outcome = match limiter.bucket(&key).await {
                    Ok(bucket) => bucket.consume().await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(()) => break,
                    Err(Error::RateLimited(r)) => return Err(MiddlewareError::RateLimited(r)),
                    Err(e) if e.is_revision_mismatch() && attempt < attempts => {
                        tracing::debug!(
                            target: "bucketeer::middleware",
                            attempt,
                            error = %e,
                            "re-acquiring stale bucket"
                        );
                        attempt += 1;
                    }
                    Err(e) => return Err(MiddlewareError::Limiter(e)),
                }
            }
            inner.call(req).await.map_err(MiddlewareError::Inner)
        })
    }
}
