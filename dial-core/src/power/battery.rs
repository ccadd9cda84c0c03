//! Fuel gauge access with a refresh cache.

use core::time::Duration;

use crate::time::MonotonicInstant;

/// Minimum spacing between gauge reads.
pub const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_millis(6_000);

/// Battery fuel gauge (a MAX17048 on the shipped board).
#[allow(clippy::missing_errors_doc)]
pub trait FuelGauge {
    type Error;

    /// Cell voltage in volts.
    fn voltage(&mut self) -> Result<f32, Self::Error>;
    /// State of charge in percent.
    fn percentage(&mut self) -> Result<f32, Self::Error>;
    /// Charge rate in percent per hour; negative while discharging.
    fn charge_rate(&mut self) -> Result<f32, Self::Error>;
}

/// One consistent set of gauge values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatteryReading {
    pub voltage: f32,
    pub percentage: f32,
    pub charge_rate: f32,
}

impl BatteryReading {
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.charge_rate > 0.0 || self.percentage >= 100.0
    }

    /// Hours until full (charging) or empty (discharging); `None` at a zero rate.
    #[must_use]
    pub fn hours_remaining(&self) -> Option<f32> {
        if self.charge_rate.abs() < f32::EPSILON {
            return None;
        }
        let remaining = if self.charge_rate > 0.0 {
            100.0 - self.percentage
        } else {
            self.percentage
        };
        Some((remaining / self.charge_rate).abs())
    }
}

/// Caches gauge readings so callers can ask every loop iteration.
#[derive(Copy, Clone, Debug)]
pub struct BatteryMonitor<I> {
    refresh_interval: Duration,
    cached: Option<(I, BatteryReading)>,
}

impl<I> BatteryMonitor<I>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            cached: None,
        }
    }

    /// Most recent successful reading, if any.
    #[must_use]
    pub fn cached(&self) -> Option<BatteryReading> {
        self.cached.map(|(_, reading)| reading)
    }

    /// Returns the cached reading, refreshing it from `gauge` once stale.
    ///
    /// # Errors
    ///
    /// Propagates the gauge error; the previous reading stays cached.
    pub fn reading<G>(&mut self, gauge: &mut G, now: I) -> Result<BatteryReading, G::Error>
    where
        G: FuelGauge,
    {
        let fresh = self
            .cached
            .filter(|(taken_at, _)| now.saturating_duration_since(*taken_at) < self.refresh_interval);
        if let Some((_, reading)) = fresh {
            return Ok(reading);
        }

        let reading = BatteryReading {
            voltage: gauge.voltage()?,
            percentage: gauge.percentage()?,
            charge_rate: gauge.charge_rate()?,
        };
        self.cached = Some((now, reading));
        Ok(reading)
    }
}

impl<I> Default for BatteryMonitor<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new(GAUGE_REFRESH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct MockInstant(u64);

    impl MonotonicInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    struct MockGauge {
        voltage: f32,
        reads: u32,
        fail: bool,
    }

    impl FuelGauge for MockGauge {
        type Error = ();

        fn voltage(&mut self) -> Result<f32, ()> {
            if self.fail {
                return Err(());
            }
            self.reads += 1;
            Ok(self.voltage)
        }

        fn percentage(&mut self) -> Result<f32, ()> {
            Ok(60.0)
        }

        fn charge_rate(&mut self) -> Result<f32, ()> {
            Ok(-12.0)
        }
    }

    #[test]
    fn charging_follows_rate_or_full() {
        let discharging = BatteryReading {
            voltage: 3.9,
            percentage: 80.0,
            charge_rate: -5.0,
        };
        assert!(!discharging.is_charging());
        assert!(
            BatteryReading {
                charge_rate: 1.5,
                ..discharging
            }
            .is_charging()
        );
        assert!(
            BatteryReading {
                percentage: 100.0,
                charge_rate: 0.0,
                ..discharging
            }
            .is_charging()
        );
    }

    #[test]
    fn hours_remaining_depends_on_direction() {
        let reading = BatteryReading {
            voltage: 3.8,
            percentage: 60.0,
            charge_rate: -12.0,
        };
        assert!(reading.hours_remaining().is_some_and(|h| (h - 5.0).abs() < 1e-6));
        let charging = BatteryReading {
            charge_rate: 20.0,
            ..reading
        };
        assert!(charging.hours_remaining().is_some_and(|h| (h - 2.0).abs() < 1e-6));
        let idle = BatteryReading {
            charge_rate: 0.0,
            ..reading
        };
        assert_eq!(idle.hours_remaining(), None);
    }

    #[test]
    fn gauge_is_read_at_most_once_per_interval() {
        let mut gauge = MockGauge {
            voltage: 3.9,
            reads: 0,
            fail: false,
        };
        let mut monitor = BatteryMonitor::default();

        monitor.reading(&mut gauge, MockInstant(0)).unwrap();
        gauge.voltage = 3.7;
        let cached = monitor.reading(&mut gauge, MockInstant(5_999)).unwrap();
        assert!((cached.voltage - 3.9).abs() < f32::EPSILON);
        assert_eq!(gauge.reads, 1);

        let fresh = monitor.reading(&mut gauge, MockInstant(6_000)).unwrap();
        assert!((fresh.voltage - 3.7).abs() < f32::EPSILON);
        assert_eq!(gauge.reads, 2);
    }

    #[test]
    fn gauge_failure_keeps_previous_reading() {
        let mut gauge = MockGauge {
            voltage: 4.0,
            reads: 0,
            fail: false,
        };
        let mut monitor = BatteryMonitor::default();
        monitor.reading(&mut gauge, MockInstant(0)).unwrap();

        gauge.fail = true;
        assert!(monitor.reading(&mut gauge, MockInstant(10_000)).is_err());
        assert!(
            monitor
                .cached()
                .is_some_and(|r| (r.voltage - 4.0).abs() < f32::EPSILON)
        );
    }
}
