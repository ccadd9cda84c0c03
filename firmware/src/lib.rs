#![cfg_attr(target_os = "none", no_std)]

//! Firmware side of the volume dial.
//!
//! Two contexts share three pieces of state: the latest mixer telemetry, the
//! command queue, and a handful of status atomics. The network context owns
//! the socket, link liveness, and power actuation; the render context owns
//! the UI, touch, and the knob. Board support supplies the `hw` traits and
//! drives both contexts, either through [`runtime`] on target or from host
//! threads in the emulator.

pub mod clock;
pub mod dispatch;
pub mod hw;
pub mod network;
pub mod power;
pub mod render;
#[cfg(target_os = "none")]
pub mod runtime;
pub mod status;
pub mod store;

use core::fmt::Debug;

use dial_core::settings::{DeviceSettings, KeyValueStore};
use dispatch::CommandDispatchQueue;
use status::DeviceStatus;
use store::RemoteStateStore;

/// State shared between the network and render contexts.
pub struct SharedState {
    pub telemetry: RemoteStateStore,
    pub commands: CommandDispatchQueue,
    pub status: DeviceStatus,
}

impl SharedState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            telemetry: RemoteStateStore::new(),
            commands: CommandDispatchQueue::new(),
            status: DeviceStatus::new(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads persisted settings, falling back to defaults when storage fails.
pub fn load_settings<K>(store: &mut K) -> DeviceSettings
where
    K: KeyValueStore,
    K::Error: Debug,
{
    match DeviceSettings::load(store) {
        Ok(settings) => {
            log_settings(&settings);
            settings
        }
        Err(err) => {
            log_settings_error(err.key, &err.error);
            DeviceSettings::DEFAULT
        }
    }
}

#[cfg(target_os = "none")]
fn log_settings(settings: &DeviceSettings) {
    defmt::info!(
        "settings: mixer .{} diagnostic_serial={}",
        settings.destination_octet,
        settings.diagnostic_serial
    );
}

#[cfg(not(target_os = "none"))]
fn log_settings(settings: &DeviceSettings) {
    println!(
        "settings: mixer .{} diagnostic_serial={}",
        settings.destination_octet, settings.diagnostic_serial
    );
}

#[cfg(target_os = "none")]
fn log_settings_error<E: Debug>(key: &'static str, err: &E) {
    defmt::warn!(
        "settings: {} unreadable ({}), using defaults",
        key,
        defmt::Debug2Format(err)
    );
}

#[cfg(not(target_os = "none"))]
fn log_settings_error<E: Debug>(key: &'static str, err: &E) {
    println!("settings: {key} unreadable ({err:?}), using defaults");
}
