//! Power actuation for the network context.
//!
//! The policy is evaluated every few seconds from the gauge, link timing, and
//! the last interaction, and again right away after any new interaction so a
//! touch on a dark or dimmed display restores it without waiting out the
//! cadence. Gauge reads stay cached at their own interval. The backlight ramp
//! advances on every poll so fades stay smooth between evaluations.

use core::fmt::Debug;

use dial_core::link::ConnectionMonitor;
use dial_core::power::{
    BatteryMonitor, BrightnessRamp, FuelGauge, PowerDecision, PowerInputs, PowerPolicyConfig,
    PowerPolicyEngine, SleepPlan,
};
use dial_core::time::MonotonicInstant;
use dial_core::ui::BatteryView;

use crate::SharedState;
use crate::hw::{Backlight, SleepController};

/// Outcome of one power poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerStep {
    Running,
    /// The sleep sequence ran; on target the device resets on wake.
    Slept(SleepPlan),
}

pub struct PowerContext<I, G, B, Z> {
    engine: PowerPolicyEngine,
    battery: BatteryMonitor<I>,
    ramp: BrightnessRamp,
    gauge: G,
    backlight: B,
    sleep: Z,
    boot: I,
    last_evaluation: Option<I>,
    last_decision: Option<PowerDecision>,
    backlight_initialized: bool,
}

impl<I, G, B, Z> PowerContext<I, G, B, Z>
where
    I: MonotonicInstant,
    G: FuelGauge,
    G::Error: Debug,
    B: Backlight,
    Z: SleepController,
{
    /// The backlight starts dark and fades in once the first decision lands.
    #[must_use]
    pub const fn new(gauge: G, backlight: B, sleep: Z, config: PowerPolicyConfig, boot: I) -> Self {
        Self {
            engine: PowerPolicyEngine::new(config),
            battery: BatteryMonitor::new(config.evaluation_interval),
            ramp: BrightnessRamp::new(0),
            gauge,
            backlight,
            sleep,
            boot,
            last_evaluation: None,
            last_decision: None,
            backlight_initialized: false,
        }
    }

    #[must_use]
    pub const fn last_decision(&self) -> Option<PowerDecision> {
        self.last_decision
    }

    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.ramp.current()
    }

    #[must_use]
    pub const fn backlight(&self) -> &B {
        &self.backlight
    }

    #[must_use]
    pub const fn sleep_controller(&self) -> &Z {
        &self.sleep
    }

    /// Evaluates when due, then advances the ramp one step.
    pub fn poll(
        &mut self,
        monitor: &ConnectionMonitor<I>,
        shared: &SharedState,
        now: I,
    ) -> PowerStep {
        if !self.backlight_initialized {
            self.apply(self.ramp.current(), shared);
            shared.status.set_display_ready(true);
            self.backlight_initialized = true;
        }

        if self.evaluation_due(shared, now) {
            self.last_evaluation = Some(now);
            if let Some(decision) = self.evaluate(monitor, shared, now) {
                if self.last_decision != Some(decision) {
                    log_decision(&decision);
                }
                self.last_decision = Some(decision);
                shared.status.publish_decision(&decision);

                if decision.should_deep_sleep {
                    return self.enter_sleep(shared);
                }
                if let Some(level) = self.ramp.set_target(decision.brightness, false) {
                    self.apply(level, shared);
                }
            }
        }

        if let Some(level) = self.ramp.step() {
            self.apply(level, shared);
        }
        PowerStep::Running
    }

    /// Restarts evaluation after a wake that did not reset the device; the
    /// wake itself counts as an interaction.
    pub fn resume(&mut self, shared: &SharedState, now: I) {
        shared.status.note_wake();
        shared.status.record_interaction(now.millis_since(self.boot));
        self.last_evaluation = None;
        self.last_decision = None;
    }

    fn evaluation_due(&self, shared: &SharedState, now: I) -> bool {
        let Some(last) = self.last_evaluation else {
            return true;
        };
        let since_evaluation = now.saturating_duration_since(last);
        if since_evaluation >= self.engine.config().evaluation_interval {
            return true;
        }
        shared
            .status
            .since_interaction(now.millis_since(self.boot))
            .is_some_and(|since| since < since_evaluation)
    }

    fn evaluate(
        &mut self,
        monitor: &ConnectionMonitor<I>,
        shared: &SharedState,
        now: I,
    ) -> Option<PowerDecision> {
        let reading = match self.battery.reading(&mut self.gauge, now) {
            Ok(reading) => reading,
            Err(err) => {
                log_gauge_error(&err);
                self.battery.cached()?
            }
        };
        shared.status.set_battery(&BatteryView::from_reading(&reading));

        // Before any packet or touch, idle time counts from boot.
        let since_boot = now.saturating_duration_since(self.boot);
        let since_network = monitor.since_last_packet(now).unwrap_or(since_boot);
        let since_interaction = shared
            .status
            .since_interaction(now.millis_since(self.boot))
            .unwrap_or(since_boot);

        let inputs = PowerInputs::from_reading(
            reading,
            since_network,
            since_interaction,
            monitor.since_connection_start(now),
        );
        Some(self.engine.evaluate(&inputs))
    }

    fn enter_sleep(&mut self, shared: &SharedState) -> PowerStep {
        if let Some(level) = self.ramp.set_target(0, true) {
            self.apply(level, shared);
        }
        let plan = self.engine.sleep_plan();
        log_sleep(self.engine.battery_empty());

        self.sleep.configure_sensor(plan.sensor);
        self.sleep.disable_radio();
        self.sleep.suspend(plan.wake);
        PowerStep::Slept(plan)
    }

    fn apply(&mut self, level: u8, shared: &SharedState) {
        self.backlight.set_level(level);
        shared.status.set_brightness(level);
    }
}

#[cfg(target_os = "none")]
fn log_decision(decision: &PowerDecision) {
    defmt::info!(
        "power: display={} brightness={} reduced={} sleep={}",
        decision.display_on,
        decision.brightness,
        decision.reduced_framerate,
        decision.should_deep_sleep
    );
}

#[cfg(not(target_os = "none"))]
fn log_decision(decision: &PowerDecision) {
    println!(
        "power: display={} brightness={} reduced={} sleep={}",
        decision.display_on,
        decision.brightness,
        decision.reduced_framerate,
        decision.should_deep_sleep
    );
}

#[cfg(target_os = "none")]
fn log_gauge_error<E: Debug>(err: &E) {
    defmt::warn!("power: gauge read failed: {}", defmt::Debug2Format(err));
}

#[cfg(not(target_os = "none"))]
fn log_gauge_error<E: Debug>(err: &E) {
    println!("power: gauge read failed: {err:?}");
}

#[cfg(target_os = "none")]
fn log_sleep(battery_empty: bool) {
    defmt::info!("power: entering deep sleep (battery_empty={})", battery_empty);
}

#[cfg(not(target_os = "none"))]
fn log_sleep(battery_empty: bool) {
    println!("power: entering deep sleep (battery_empty={battery_empty})");
}
