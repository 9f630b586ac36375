use bucketeer::{hash, InMemoryStore, Limiter, ManualClock, Store};
use std::time::Duration;

pub const WINDOW: Duration = Duration::from_secs(60);

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Route `tracing` output through the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn limiter_with<S: Store + 'static>(
    limit: u64,
    back_offs: Vec<Duration>,
    clock: &ManualClock,
    store: S,
) -> Limiter<str> {
    Limiter::<str>::builder()
        .label("test")
        .limit(limit)
        .reset_after(WINDOW)
        .back_offs(back_offs)
        .hasher(hash::identity)
        .store(store)
        .with_clock(clock.clone())
        .build()
        .expect("valid limiter config")
}

#[allow(dead_code)]
pub fn limiter(limit: u64, back_offs: Vec<Duration>, clock: &ManualClock) -> Limiter<str> {
    limiter_with(limit, back_offs, clock, InMemoryStore::new())
}
