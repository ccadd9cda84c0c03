//! Cross-context status flags.
//!
//! Everything is a lone atomic so either context can read without taking a
//! lock. Timestamps are milliseconds since boot stored `+1`, leaving zero to
//! mean "never".

use core::time::Duration;

use dial_core::power::PowerDecision;
use dial_core::ui::BatteryView;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};

const UNKNOWN_BATTERY: u8 = u8::MAX;
const UNKNOWN_MINUTES: u16 = u16::MAX;

pub struct DeviceStatus {
    last_interaction_ms: AtomicU64,
    display_ready: AtomicBool,
    display_on: AtomicBool,
    brightness: AtomicU8,
    reduced_framerate: AtomicBool,
    battery_percent: AtomicU8,
    battery_charging: AtomicBool,
    battery_minutes: AtomicU16,
    wakes: AtomicU32,
}

impl DeviceStatus {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_interaction_ms: AtomicU64::new(0),
            display_ready: AtomicBool::new(false),
            display_on: AtomicBool::new(true),
            brightness: AtomicU8::new(0),
            reduced_framerate: AtomicBool::new(false),
            battery_percent: AtomicU8::new(UNKNOWN_BATTERY),
            battery_charging: AtomicBool::new(false),
            battery_minutes: AtomicU16::new(UNKNOWN_MINUTES),
            wakes: AtomicU32::new(0),
        }
    }

    /// Notes a touch or knob movement at `now_ms` since boot.
    pub fn record_interaction(&self, now_ms: u64) {
        self.last_interaction_ms
            .store(encode_millis(now_ms), Ordering::Relaxed);
    }

    /// Time since the last interaction, or `None` if there never was one.
    #[must_use]
    pub fn since_interaction(&self, now_ms: u64) -> Option<Duration> {
        let stored = decode_millis(self.last_interaction_ms.load(Ordering::Relaxed))?;
        Some(Duration::from_millis(now_ms.saturating_sub(stored)))
    }

    /// Set once the backlight has been driven to its initial level.
    pub fn set_display_ready(&self, ready: bool) {
        self.display_ready.store(ready, Ordering::Release);
    }

    #[must_use]
    pub fn display_ready(&self) -> bool {
        self.display_ready.load(Ordering::Acquire)
    }

    /// Publishes the parts of a power decision the render context follows.
    pub fn publish_decision(&self, decision: &PowerDecision) {
        self.display_on
            .store(decision.display_on, Ordering::Relaxed);
        self.reduced_framerate
            .store(decision.reduced_framerate, Ordering::Relaxed);
    }

    /// Current backlight level after ramping.
    pub fn set_brightness(&self, level: u8) {
        self.brightness.store(level, Ordering::Relaxed);
    }

    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn display_on(&self) -> bool {
        self.display_on.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reduced_framerate(&self) -> bool {
        self.reduced_framerate.load(Ordering::Relaxed)
    }

    /// Publishes the latest battery view; the percentage is written last.
    pub fn set_battery(&self, view: &BatteryView) {
        self.battery_charging.store(view.charging, Ordering::Relaxed);
        self.battery_minutes.store(
            view.minutes_remaining.unwrap_or(UNKNOWN_MINUTES),
            Ordering::Relaxed,
        );
        self.battery_percent
            .store(view.percentage.min(100), Ordering::Release);
    }

    /// Latest battery view, `None` until the gauge has answered once.
    #[must_use]
    pub fn battery(&self) -> Option<BatteryView> {
        let percentage = match self.battery_percent.load(Ordering::Acquire) {
            UNKNOWN_BATTERY => return None,
            percent => percent,
        };
        let minutes_remaining = match self.battery_minutes.load(Ordering::Relaxed) {
            UNKNOWN_MINUTES => None,
            minutes => Some(minutes),
        };
        Some(BatteryView {
            percentage,
            charging: self.battery_charging.load(Ordering::Relaxed),
            minutes_remaining,
        })
    }

    /// Counts a return from deep sleep that did not reset the device.
    pub fn note_wake(&self) {
        self.wakes.fetch_add(1, Ordering::Release);
    }

    #[must_use]
    pub fn wake_count(&self) -> u32 {
        self.wakes.load(Ordering::Acquire)
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::new()
    }
}

const fn encode_millis(millis: u64) -> u64 {
    millis.saturating_add(1)
}

const fn decode_millis(raw: u64) -> Option<u64> {
    if raw == 0 { None } else { Some(raw - 1) }
}
