//! Shared helpers for sitepipe's unit and integration tests.

pub mod builders;
pub mod fake_executor;
pub mod recording;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for any single async test step.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Capture `tracing` output per test; the harness shows it for failures
/// (or always with `--nocapture`). Reads `SITEPIPE_LOG`, default `info`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("SITEPIPE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        // Another harness may have installed a subscriber first.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, panicking after [`TEST_TIMEOUT`].
pub async fn with_timeout<F: Future>(f: F) -> F::Output {
    with_timeout_of(TEST_TIMEOUT, f).await
}

pub async fn with_timeout_of<F: Future>(limit: Duration, f: F) -> F::Output {
    match tokio::time::timeout(limit, f).await {
        Ok(out) => out,
        Err(_) => panic!("test step did not finish within {limit:?}"),
    }
}
