//! Render context: UI state, touch, knob, and frame presentation.
//!
//! Works from a local copy of the telemetry store so a pass never holds the
//! store lock while building a frame. Commands produced by input go onto the
//! dispatch queue; the pending overlay lives here and nowhere else.

use core::fmt::Debug;
use core::time::Duration;

use dial_core::settings::DeviceSettings;
use dial_core::time::MonotonicInstant;
use dial_core::ui::{GestureFilter, RotationTracker, UiController, UiEvent};

use crate::SharedState;
use crate::hw::{FrameSink, RotationSensor, TouchPanel};
use crate::store::TelemetryView;

/// Delay between render passes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RenderCadence {
    pub active: Duration,
    /// Used while the power policy asks for a reduced frame rate.
    pub reduced: Duration,
}

impl RenderCadence {
    pub const DEFAULT: Self = Self {
        active: Duration::from_millis(16),
        reduced: Duration::from_millis(250),
    };
}

impl Default for RenderCadence {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub struct RenderContext<I, T, R, F> {
    ui: UiController<I>,
    gestures: GestureFilter<I>,
    rotation: RotationTracker,
    view: TelemetryView,
    touch: T,
    sensor: R,
    display: F,
    cadence: RenderCadence,
    boot: I,
    frames_presented: u32,
    seen_wakes: u32,
}

impl<I, T, R, F> RenderContext<I, T, R, F>
where
    I: MonotonicInstant,
    T: TouchPanel,
    R: RotationSensor,
    R::Error: Debug,
    F: FrameSink,
{
    #[must_use]
    pub const fn new(
        touch: T,
        sensor: R,
        display: F,
        settings: DeviceSettings,
        cadence: RenderCadence,
        boot: I,
    ) -> Self {
        Self {
            ui: UiController::new(settings.destination_octet, settings.diagnostic_serial),
            gestures: GestureFilter::new(),
            rotation: RotationTracker::new(),
            view: TelemetryView::EMPTY,
            touch,
            sensor,
            display,
            cadence,
            boot,
            frames_presented: 0,
            seen_wakes: 0,
        }
    }

    #[must_use]
    pub const fn ui(&self) -> &UiController<I> {
        &self.ui
    }

    #[must_use]
    pub const fn view(&self) -> &TelemetryView {
        &self.view
    }

    #[must_use]
    pub const fn display(&self) -> &F {
        &self.display
    }

    #[must_use]
    pub const fn frames_presented(&self) -> u32 {
        self.frames_presented
    }

    /// Runs one pass and returns the delay before the next.
    pub fn poll(&mut self, shared: &SharedState, now: I) -> Duration {
        // The knob may have moved while asleep; take a fresh reference angle.
        let wakes = shared.status.wake_count();
        if wakes != self.seen_wakes {
            self.seen_wakes = wakes;
            self.rotation.reset();
        }

        shared.telemetry.refresh_into(&mut self.view);
        self.ui.sync_connection(self.view.connected);
        self.ui.reconcile(&self.view.snapshot, now);

        let touch = self
            .touch
            .poll()
            .and_then(|raw| self.gestures.next_gesture(raw, now));
        if let Some(touch) = touch {
            self.apply(UiEvent::Touch(touch), shared, now);
        }

        match self.sensor.read_field() {
            Ok(Some((x, y))) => {
                if let Some(degrees) = self.rotation.update(x, y) {
                    self.apply(UiEvent::Rotate { degrees }, shared, now);
                }
            }
            Ok(None) => {}
            Err(err) => log_sensor_error(&err),
        }

        let status = &shared.status;
        if status.display_ready() && status.display_on() {
            let frame = self.ui.frame(&self.view.snapshot, status.battery());
            self.display.present(&frame);
            self.frames_presented = self.frames_presented.wrapping_add(1);
        }

        if status.reduced_framerate() {
            self.cadence.reduced
        } else {
            self.cadence.active
        }
    }

    fn apply(&mut self, event: UiEvent, shared: &SharedState, now: I) {
        shared
            .status
            .record_interaction(now.millis_since(self.boot));
        if let Some(item) = self.ui.handle(event, &self.view.snapshot, now) {
            // A full queue logs and drops the item.
            let _ = shared.commands.push(item);
        }
    }
}

#[cfg(target_os = "none")]
fn log_sensor_error<E: Debug>(err: &E) {
    defmt::warn!("render: rotation sensor read failed: {}", defmt::Debug2Format(err));
}

#[cfg(not(target_os = "none"))]
fn log_sensor_error<E: Debug>(err: &E) {
    println!("render: rotation sensor read failed: {err:?}");
}
