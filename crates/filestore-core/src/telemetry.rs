//! Tracing subscriber setup for tests and benchmarks
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to whoever owns the process.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install an `EnvFilter` + fmt subscriber writing through the test harness
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
