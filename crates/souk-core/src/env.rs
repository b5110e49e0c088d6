//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples market logic from system resources
//! (time, randomness, async sleeping). Tests drive the sale countdown with
//! a hand-advanced clock; the production runtime plugs in system time and
//! OS randomness without any change to the market logic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards within
/// a single execution context. The sale session derives `time_left` from
/// elapsed wall-clock time, so a non-monotonic clock would corrupt the
/// countdown.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait, and it should only be
    /// used by runtime code (not market logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Used for connection IDs and generated buyer IDs. Production
    /// implementations use OS entropy; test implementations may be
    /// deterministic.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for connection IDs.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
