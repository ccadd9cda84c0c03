//! Power-aware duty cycling for the display and the whole device.
//!
//! [`PowerPolicyEngine::evaluate`] maps battery, link and interaction
//! recency onto a complete [`PowerDecision`]. The decision is then actuated
//! by the firmware through a [`BrightnessRamp`] and, when requested, a
//! [`SleepPlan`].

pub mod battery;
pub mod brightness;
pub mod sleep;

use core::time::Duration;

pub use battery::{BatteryMonitor, BatteryReading, FuelGauge};
pub use brightness::BrightnessRamp;
pub use sleep::{SensorMode, SleepPlan, WakeSource};

/// Thresholds driving the policy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerPolicyConfig {
    /// On external power: no telemetry for this long (with no interaction) turns the display off.
    pub plugged_no_network: Duration,
    /// On external power: no interaction for this long (with no telemetry) turns the display off.
    pub plugged_no_interaction: Duration,
    /// On battery: idle this long before dimming and slowing the render loop.
    pub battery_no_interaction: Duration,
    /// On battery: once dimmed, no telemetry for this long sends the device to deep sleep.
    pub battery_no_network: Duration,
    /// After (re)connecting, power saving is suspended for this long.
    pub connection_grace: Duration,
    /// Below this voltage the battery counts as empty.
    pub empty_voltage: f32,
    /// Voltage margin above `empty_voltage` needed to leave the empty state.
    pub empty_release_margin: f32,
    pub full_brightness: u8,
    pub dim_brightness: u8,
    /// Policy re-evaluation cadence; never shorter than the gauge refresh.
    pub evaluation_interval: Duration,
}

impl PowerPolicyConfig {
    pub const DEFAULT: Self = Self {
        plugged_no_network: Duration::from_millis(30_000),
        plugged_no_interaction: Duration::from_millis(60_000),
        battery_no_interaction: Duration::from_millis(20_000),
        battery_no_network: Duration::from_millis(16_000),
        connection_grace: Duration::from_millis(10_000),
        empty_voltage: 3.65,
        empty_release_margin: 0.05,
        full_brightness: 255,
        dim_brightness: 40,
        evaluation_interval: battery::GAUGE_REFRESH_INTERVAL,
    };
}

impl Default for PowerPolicyConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Snapshot of everything the policy looks at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerInputs {
    pub is_charging: bool,
    pub battery_voltage: f32,
    pub battery_percentage: f32,
    pub since_network: Duration,
    pub since_interaction: Duration,
    /// `None` while disconnected.
    pub since_connection_start: Option<Duration>,
}

impl PowerInputs {
    /// Combines a gauge reading with link and interaction timing.
    #[must_use]
    pub fn from_reading(
        reading: BatteryReading,
        since_network: Duration,
        since_interaction: Duration,
        since_connection_start: Option<Duration>,
    ) -> Self {
        Self {
            is_charging: reading.is_charging(),
            battery_voltage: reading.voltage,
            battery_percentage: reading.percentage,
            since_network,
            since_interaction,
            since_connection_start,
        }
    }
}

/// Fully computed power decision, actuated as a unit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerDecision {
    pub display_on: bool,
    pub brightness: u8,
    pub reduced_framerate: bool,
    pub should_deep_sleep: bool,
}

impl PowerDecision {
    #[must_use]
    pub const fn active(brightness: u8) -> Self {
        Self {
            display_on: true,
            brightness,
            reduced_framerate: false,
            should_deep_sleep: false,
        }
    }
}

/// Decision procedure with a latched empty-battery state.
#[derive(Clone, Debug)]
pub struct PowerPolicyEngine {
    config: PowerPolicyConfig,
    battery_empty: bool,
}

impl PowerPolicyEngine {
    #[must_use]
    pub const fn new(config: PowerPolicyConfig) -> Self {
        Self {
            config,
            battery_empty: false,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PowerPolicyConfig {
        &self.config
    }

    /// Whether the last evaluation considered the battery empty.
    #[must_use]
    pub const fn battery_empty(&self) -> bool {
        self.battery_empty
    }

    /// Evaluates the policy for one cycle.
    ///
    /// Rules apply in order; later rules override earlier ones:
    /// 1. idle timeouts (plugged or battery branch),
    /// 2. the post-connect grace window restores full activity,
    /// 3. an empty battery forces display off and deep sleep,
    /// 4. a dark display always has brightness 0.
    pub fn evaluate(&mut self, inputs: &PowerInputs) -> PowerDecision {
        let config = &self.config;
        let mut decision = PowerDecision::active(config.full_brightness);

        if inputs.is_charging {
            if inputs.since_network > config.plugged_no_network
                && inputs.since_interaction > config.plugged_no_interaction
            {
                decision.display_on = false;
            }
        } else if inputs.since_interaction > config.battery_no_interaction {
            decision.reduced_framerate = true;
            decision.brightness = config.dim_brightness;

            if inputs.since_network > config.battery_no_network {
                decision.display_on = false;
                decision.should_deep_sleep = true;
            }
        }

        if inputs
            .since_connection_start
            .is_some_and(|elapsed| elapsed < config.connection_grace)
        {
            decision = PowerDecision::active(config.full_brightness);
        }

        self.update_empty_latch(inputs);
        if self.battery_empty {
            decision.display_on = false;
            decision.should_deep_sleep = true;
        }

        if !decision.display_on {
            decision.brightness = 0;
        }

        decision
    }

    /// Sleep plan matching the current battery state.
    #[must_use]
    pub const fn sleep_plan(&self) -> SleepPlan {
        SleepPlan::for_battery(self.battery_empty)
    }

    fn update_empty_latch(&mut self, inputs: &PowerInputs) {
        let config = &self.config;
        if inputs.is_charging {
            self.battery_empty = false;
        } else if inputs.battery_voltage < config.empty_voltage {
            self.battery_empty = true;
        } else if inputs.battery_voltage >= config.empty_voltage + config.empty_release_margin {
            self.battery_empty = false;
        }
    }
}

impl Default for PowerPolicyEngine {
    fn default() -> Self {
        Self::new(PowerPolicyConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_battery() -> PowerInputs {
        PowerInputs {
            is_charging: false,
            battery_voltage: 3.9,
            battery_percentage: 50.0,
            since_network: Duration::from_millis(0),
            since_interaction: Duration::from_millis(0),
            since_connection_start: None,
        }
    }

    #[test]
    fn fresh_activity_keeps_full_brightness() {
        let mut engine = PowerPolicyEngine::default();
        assert_eq!(engine.evaluate(&on_battery()), PowerDecision::active(255));
    }

    #[test]
    fn idle_on_battery_dims_and_slows() {
        let mut engine = PowerPolicyEngine::default();
        let inputs = PowerInputs {
            since_interaction: Duration::from_millis(20_001),
            since_network: Duration::from_millis(1_000),
            ..on_battery()
        };
        assert_eq!(
            engine.evaluate(&inputs),
            PowerDecision {
                display_on: true,
                brightness: 40,
                reduced_framerate: true,
                should_deep_sleep: false,
            }
        );
    }

    #[test]
    fn exactly_at_threshold_is_not_exceeded() {
        let mut engine = PowerPolicyEngine::default();
        let inputs = PowerInputs {
            since_interaction: Duration::from_millis(20_000),
            ..on_battery()
        };
        assert_eq!(engine.evaluate(&inputs), PowerDecision::active(255));
    }

    #[test]
    fn network_loss_while_idle_requests_sleep() {
        let mut engine = PowerPolicyEngine::default();
        let inputs = PowerInputs {
            since_interaction: Duration::from_millis(25_000),
            since_network: Duration::from_millis(20_000),
            ..on_battery()
        };
        let decision = engine.evaluate(&inputs);
        assert_eq!(
            decision,
            PowerDecision {
                display_on: false,
                brightness: 0,
                reduced_framerate: true,
                should_deep_sleep: true,
            }
        );
        assert_eq!(engine.sleep_plan(), SleepPlan::for_battery(false));
    }

    #[test]
    fn plugged_in_turns_display_off_but_never_sleeps() {
        let mut engine = PowerPolicyEngine::default();
        let inputs = PowerInputs {
            is_charging: true,
            since_interaction: Duration::from_millis(60_001),
            since_network: Duration::from_millis(30_001),
            ..on_battery()
        };
        assert_eq!(
            engine.evaluate(&inputs),
            PowerDecision {
                display_on: false,
                brightness: 0,
                reduced_framerate: false,
                should_deep_sleep: false,
            }
        );

        let recent_network = PowerInputs {
            since_network: Duration::from_millis(1_000),
            ..inputs
        };
        assert_eq!(engine.evaluate(&recent_network), PowerDecision::active(255));
    }

    #[test]
    fn empty_battery_overrides_grace() {
        let mut engine = PowerPolicyEngine::default();
        let inputs = PowerInputs {
            battery_voltage: 3.5,
            since_connection_start: Some(Duration::from_millis(1_000)),
            ..on_battery()
        };
        let decision = engine.evaluate(&inputs);
        assert!(decision.should_deep_sleep);
        assert!(!decision.display_on);
        assert_eq!(decision.brightness, 0);
        assert_eq!(engine.sleep_plan(), SleepPlan::for_battery(true));
    }

    #[test]
    fn empty_latch_needs_margin_to_release() {
        let mut engine = PowerPolicyEngine::default();
        let low = PowerInputs {
            battery_voltage: 3.60,
            ..on_battery()
        };
        engine.evaluate(&low);
        assert!(engine.battery_empty());

        let recovering = PowerInputs {
            battery_voltage: 3.67,
            ..on_battery()
        };
        assert!(engine.evaluate(&recovering).should_deep_sleep);

        let recovered = PowerInputs {
            battery_voltage: 3.71,
            ..on_battery()
        };
        assert!(!engine.evaluate(&recovered).should_deep_sleep);
        assert!(!engine.battery_empty());
    }

    #[test]
    fn charging_releases_empty_latch() {
        let mut engine = PowerPolicyEngine::default();
        engine.evaluate(&PowerInputs {
            battery_voltage: 3.40,
            ..on_battery()
        });
        assert!(engine.battery_empty());

        let charging = PowerInputs {
            is_charging: true,
            battery_voltage: 3.45,
            ..on_battery()
        };
        assert_eq!(engine.evaluate(&charging), PowerDecision::active(255));
    }

    #[test]
    fn deep_sleep_always_dark() {
        let mut engine = PowerPolicyEngine::default();
        for interaction in [0_u64, 19_000, 21_000, 90_000] {
            for network in [0_u64, 15_000, 17_000, 90_000] {
                for voltage in [3.3_f32, 3.7, 4.1] {
                    let decision = engine.evaluate(&PowerInputs {
                        battery_voltage: voltage,
                        since_interaction: Duration::from_millis(interaction),
                        since_network: Duration::from_millis(network),
                        ..on_battery()
                    });
                    if decision.should_deep_sleep {
                        assert!(!decision.display_on);
                        assert_eq!(decision.brightness, 0);
                    }
                }
            }
        }
    }
}
