//! Monotonic time abstraction shared by every timed component.

use core::time::Duration;

/// Monotonic timestamp supplied by the runtime (embassy on target, `std` on host).
pub trait MonotonicInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;

    /// Milliseconds elapsed from `earlier` to `self`, saturating at `u64::MAX`.
    fn millis_since(&self, earlier: Self) -> u64 {
        u64::try_from(self.saturating_duration_since(earlier).as_millis()).unwrap_or(u64::MAX)
    }
}
