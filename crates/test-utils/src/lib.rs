// crates/test-utils/src/lib.rs

//! Shared helpers for the `jobdag` integration tests.
//!
//! - [`builders`]: terse construction of `JobConfig` lists.
//! - [`handlers`]: a scripted handler that records calls and concurrency.

pub mod builders;
pub mod handlers;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Output goes through `with_test_writer()`, so it is only shown for failing
/// tests unless run with `-- --nocapture`. Set `RUST_LOG=debug` for detail.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        // Another test binary helper may have installed one already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Upper bound for any single execution in the test suite.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_TIMEOUT:?}"))
}
