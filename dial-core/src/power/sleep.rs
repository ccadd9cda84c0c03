//! Deep-sleep plan chosen from the battery state.

use core::time::Duration;

/// Periodic wake used to re-check an empty battery.
pub const EMPTY_BATTERY_RECHECK: Duration = Duration::from_secs(30 * 60);

/// Rotation sensor configuration while the processor sleeps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorMode {
    /// Low-power wake-on-change; the sensor raises its interrupt when the knob moves.
    WakeOnChange,
    /// Sensor fully powered down.
    Shutdown,
}

/// What brings the processor back.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeSource {
    /// External interrupt from the rotation sensor.
    KnobInterrupt,
    /// Timer wake after the given delay.
    Timer(Duration),
}

/// Ordered deep-sleep transition: configure the sensor, drop the radio, suspend.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepPlan {
    pub sensor: SensorMode,
    pub wake: WakeSource,
}

impl SleepPlan {
    #[must_use]
    pub const fn for_battery(empty: bool) -> Self {
        if empty {
            Self {
                sensor: SensorMode::Shutdown,
                wake: WakeSource::Timer(EMPTY_BATTERY_RECHECK),
            }
        } else {
            Self {
                sensor: SensorMode::WakeOnChange,
                wake: WakeSource::KnobInterrupt,
            }
        }
    }
}
