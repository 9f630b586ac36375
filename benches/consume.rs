use bucketeer::middleware::ConsumeLayer;
use bucketeer::{hash, InMemoryStore, Limiter};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::future::Ready;
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

// A simple service that just returns its input.
#[derive(Clone)]
struct EchoService;

impl Service<&'static str> for EchoService {
    type Response = &'static str;
    type Error = std::io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &'static str) -> Self::Future {
        futures::future::ready(Ok(req))
    }
}

fn limiter(limit: u64) -> Limiter<&'static str> {
    Limiter::<&'static str>::builder()
        .label("bench")
        .limit(limit)
        .reset_after(Duration::from_secs(3600))
        .hasher(hash::display)
        .store(InMemoryStore::new())
        .build()
        .unwrap()
}

fn consume_admitted(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bucket = rt.block_on(limiter(u64::MAX).bucket(&"key")).unwrap();

    c.bench_function("consume_admitted", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(bucket.consume().await);
        });
    });
}

fn consume_rejected(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bucket = rt.block_on(limiter(0).bucket(&"key")).unwrap();

    // Rejections never reach the store.
    c.bench_function("consume_rejected", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(bucket.consume().await);
        });
    });
}

fn middleware_acquire_and_consume(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let layer = ConsumeLayer::new(limiter(u64::MAX), |req: &&'static str| *req);
    let svc = layer.layer(EchoService);

    c.bench_function("middleware_acquire_and_consume", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(svc.clone().oneshot(black_box("request")).await);
        });
    });
}

criterion_group!(benches, consume_admitted, consume_rejected, middleware_acquire_and_consume);
criterion_main!(benches);
