//! Embassy loops driving both contexts on target.
//!
//! Board support constructs the peripherals, loads settings, and spawns one
//! task per context that awaits [`run_network`] or [`run_render`]. The two
//! contexts may live on different cores; they only meet through [`SHARED`].

use core::fmt::Debug;

use dial_core::power::FuelGauge;
use dial_core::settings::KeyValueStore;
use embassy_futures::yield_now;
use embassy_time::Timer;

use crate::SharedState;
use crate::clock::{FirmwareInstant, to_embassy};
use crate::hw::{
    Backlight, DatagramSocket, FrameSink, PROBE_RETRY_INTERVAL, Probe, RotationSensor,
    SleepController, TouchPanel, probe_attempt,
};
use crate::network::NetworkContext;
use crate::power::{PowerContext, PowerStep};
use crate::render::RenderContext;

/// Shared state for the whole firmware image.
pub static SHARED: SharedState = SharedState::new();

/// Idle delay for the network loop when a poll moved no data.
const NETWORK_IDLE_DELAY: embassy_time::Duration = embassy_time::Duration::from_millis(2);

/// Probes `device` until it answers, yielding to other tasks between attempts.
///
/// Returns the number of attempts it took.
pub async fn wait_until_present<P: Probe>(device: &mut P, name: &'static str) -> u32 {
    let mut attempts = 1;
    while !probe_attempt(device, name, attempts) {
        Timer::after(to_embassy(PROBE_RETRY_INTERVAL)).await;
        attempts += 1;
    }
    attempts
}

/// Network side: socket, liveness, and power actuation.
pub async fn run_network<S, K, G, B, Z>(
    network: &mut NetworkContext<FirmwareInstant, S, K>,
    power: &mut PowerContext<FirmwareInstant, G, B, Z>,
) -> !
where
    S: DatagramSocket,
    S::Error: Debug,
    K: KeyValueStore,
    K::Error: Debug,
    G: FuelGauge,
    G::Error: Debug,
    B: Backlight,
    Z: SleepController,
{
    defmt::info!("network: loop started");
    loop {
        let now = FirmwareInstant::now();
        let activity = network.poll(&SHARED, now);
        if let PowerStep::Slept(_) = power.poll(network.monitor(), &SHARED, now) {
            // Deep sleep resets on wake; reaching here means the suspend was refused.
            power.resume(&SHARED, FirmwareInstant::now());
        }

        if activity.is_idle() {
            Timer::after(NETWORK_IDLE_DELAY).await;
        } else {
            yield_now().await;
        }
    }
}

/// Render side: UI, touch, knob, display.
pub async fn run_render<T, R, F>(render: &mut RenderContext<FirmwareInstant, T, R, F>) -> !
where
    T: TouchPanel,
    R: RotationSensor,
    R::Error: Debug,
    F: FrameSink,
{
    defmt::info!("render: loop started");
    loop {
        let delay = render.poll(&SHARED, FirmwareInstant::now());
        Timer::after(to_embassy(delay)).await;
    }
}
