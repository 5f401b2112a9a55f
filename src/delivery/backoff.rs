//! Exponential backoff between delivery attempts.
//!
//! After the attempt with zero-based index `i` fails (and it is not the last
//! one) the client waits `2^i` units: 1, 2, 4, ... No jitter. Sleeping is
//! behind [`Sleeper`] so tests can record waits instead of taking them.

use std::time::Duration;

/// Exponent cap; keeps the multiplier inside `u32`.
const MAX_EXPONENT: u32 = 16;

/// Delay to wait after the attempt at `completed_index` failed.
pub fn backoff_delay(completed_index: u32, unit: Duration) -> Duration {
    unit.saturating_mul(1u32 << completed_index.min(MAX_EXPONENT))
}

/// Blocks the current thread for a while.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Real sleeping via `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
