//! Embassy time bound to the core [`MonotonicInstant`] trait.

use core::time::Duration;

use dial_core::time::MonotonicInstant;
use embassy_time::Instant;

/// Monotonic instant used by every firmware context.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Reads the embassy time driver; host builds need the `std` driver.
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Instant::from_millis(millis))
    }

    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0
            .checked_duration_since(earlier.0)
            .map_or(Duration::ZERO, |elapsed| {
                Duration::from_micros(elapsed.as_micros())
            })
    }
}

/// Converts a core duration into an embassy one, saturating on overflow.
#[must_use]
pub fn to_embassy(duration: Duration) -> embassy_time::Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    embassy_time::Duration::from_micros(micros)
}
