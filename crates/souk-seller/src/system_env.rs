//! Production Environment implementation using system time and RNG.

use std::time::Duration;

use souk_core::env::Environment;

/// Production environment using system time and OS randomness.
///
/// - `std::time::Instant::now()` for time
/// - `tokio::time::sleep()` for async sleeping
/// - `getrandom` for connection IDs
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Should never fail on supported platforms; connection IDs only
            // need uniqueness, so fall back to zeros rather than aborting.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
