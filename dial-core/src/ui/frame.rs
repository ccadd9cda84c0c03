//! Render-ready view of the UI state.
//!
//! The display driver consumes a [`Frame`]; nothing here touches pixels.

use core::fmt::Write as _;

use heapless::String;

use crate::pending::DisplayState;
use crate::power::BatteryReading;
use crate::state::{LEVEL_UNITY, MixerEdition, TelemetrySnapshot, level_to_db};

use super::{ARC_COUNT, FIRST_STRIP, GRID_COLUMNS, GRID_ROWS, UiScreen};

/// Level meter channels (left, right) feeding each arc.
pub const ARC_METER_CHANNELS: [(usize, usize); ARC_COUNT] = [(10, 11), (18, 19), (26, 27)];

/// One strip's gain arc with its stereo level overlay.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArcView<'a> {
    pub strip: usize,
    pub label: &'a str,
    /// Shifted gain level, `0..=6000` at or below unity.
    pub gain_level: u16,
    /// Meter levels scaled by the strip gain.
    pub left_level: u16,
    pub right_level: u16,
    pub selected: bool,
}

/// Battery corner of the status bar.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BatteryView {
    /// State of charge, `0..=100`.
    pub percentage: u8,
    pub charging: bool,
    /// Minutes until full while charging, until empty otherwise.
    pub minutes_remaining: Option<u16>,
}

impl BatteryView {
    #[must_use]
    pub fn from_reading(reading: &BatteryReading) -> Self {
        Self {
            percentage: percent_to_u8(reading.percentage),
            charging: reading.is_charging(),
            minutes_remaining: reading.hours_remaining().map(hours_to_minutes),
        }
    }
}

/// Everything the display needs for one refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<'a> {
    pub screen: UiScreen,
    pub connected: bool,
    pub mixer: MixerEdition,
    pub arcs: [ArcView<'a>; ARC_COUNT],
    /// Selected strip gain, e.g. `-12.5dB`.
    pub db_label: String<16>,
    /// Routing grid indexed `[column][row]`: column = strip, row = bus.
    pub buttons: [[DisplayState; GRID_ROWS]; GRID_COLUMNS],
    /// Bus names for the grid rows, A1 first.
    pub bus_labels: [&'a str; GRID_ROWS],
    pub destination_octet: u8,
    pub diagnostic_serial: bool,
    pub battery: Option<BatteryView>,
}

pub(super) fn arc_view(snapshot: &TelemetrySnapshot, index: usize, selected: bool) -> ArcView<'_> {
    let strip = FIRST_STRIP + index;
    let gain_level = snapshot.strip_gain_level(strip);
    let (left, right) = ARC_METER_CHANNELS[index];
    ArcView {
        strip,
        label: snapshot.strip_label(strip),
        gain_level,
        left_level: scale_by_gain(snapshot.channel_level(left), gain_level),
        right_level: scale_by_gain(snapshot.channel_level(right), gain_level),
        selected,
    }
}

pub(super) fn db_label(level: u16) -> String<16> {
    let mut label = String::new();
    // At most "-60.0dB" or "327.7dB".
    let _ = write!(label, "{:.1}dB", level_to_db(level));
    label
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_to_u8(percentage: f32) -> u8 {
    (percentage.clamp(0.0, 100.0) + 0.5) as u8
}

// Clamped below `u16::MAX`, which status storage reserves for "unknown".
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hours_to_minutes(hours: f32) -> u16 {
    (hours * 60.0 + 0.5).clamp(0.0, f32::from(u16::MAX - 1)) as u16
}

fn scale_by_gain(level: u16, gain_level: u16) -> u16 {
    let scaled = u32::from(level) * u32::from(gain_level) / u32::from(LEVEL_UNITY);
    u16::try_from(scaled).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gain_passes_meter_through() {
        let mut snapshot = TelemetrySnapshot::EMPTY;
        snapshot.input_levels[18] = -600;
        snapshot.input_levels[19] = -1200;
        let arc = arc_view(&snapshot, 1, true);

        assert_eq!(arc.strip, 6);
        assert_eq!(arc.gain_level, 6000);
        assert_eq!(arc.left_level, 5400);
        assert_eq!(arc.right_level, 4800);
        assert!(arc.selected);
    }

    #[test]
    fn reduced_gain_scales_meter() {
        let mut snapshot = TelemetrySnapshot::EMPTY;
        snapshot.strip_gain_layers[0][7] = -3000;
        snapshot.input_levels[26] = 0;
        let arc = arc_view(&snapshot, 2, false);
        assert_eq!(arc.gain_level, 3000);
        assert_eq!(arc.left_level, 3000);
    }

    #[test]
    fn battery_view_rounds_and_estimates() {
        let discharging = BatteryReading {
            voltage: 3.9,
            percentage: 49.6,
            charge_rate: -20.0,
        };
        assert_eq!(
            BatteryView::from_reading(&discharging),
            BatteryView {
                percentage: 50,
                charging: false,
                minutes_remaining: Some(149),
            }
        );

        let idle = BatteryReading {
            charge_rate: 0.0,
            ..discharging
        };
        assert_eq!(BatteryView::from_reading(&idle).minutes_remaining, None);

        let trickle = BatteryReading {
            percentage: 10.0,
            charge_rate: 0.001,
            ..discharging
        };
        let view = BatteryView::from_reading(&trickle);
        assert!(view.charging);
        assert_eq!(view.minutes_remaining, Some(u16::MAX - 1));
    }

    #[test]
    fn db_label_has_one_decimal() {
        assert_eq!(db_label(4750).as_str(), "-12.5dB");
        assert_eq!(db_label(6000).as_str(), "0.0dB");
        assert_eq!(db_label(0).as_str(), "-60.0dB");
    }
}
