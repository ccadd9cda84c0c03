//! Mirrored mixer state decoded from realtime telemetry.
//!
//! A [`TelemetrySnapshot`] is only ever produced whole by
//! [`crate::codec::decode`]; consumers read it through the accessors below,
//! which translate the wire's signed dB×100 values into the shifted,
//! non-negative level domain the UI works in.

/// Number of input level meters carried per frame.
pub const INPUT_CHANNELS: usize = 34;
/// Number of bus output level meters carried per frame.
pub const OUTPUT_CHANNELS: usize = 64;
/// Strips and buses are both reported as groups of eight.
pub const STRIP_COUNT: usize = 8;
/// Buses reported per frame.
pub const BUS_COUNT: usize = 8;
/// Gain layers reported per strip.
pub const GAIN_LAYERS: usize = 8;
/// Fixed size of every UTF-8 label slot.
pub const LABEL_LEN: usize = 60;

/// Offset added to raw dB×100 values so -60 dB lands on zero.
pub const LEVEL_FLOOR_OFFSET: i32 = 6000;
/// Shifted level that corresponds to 0 dB.
pub const LEVEL_UNITY: u16 = 6000;

/// Routing bits for buses A1..=A5 in a strip state word.
pub const ROUTE_BITS: [u32; 5] = [0x0000_1000, 0x0000_2000, 0x0000_4000, 0x0000_8000, 0x0008_0000];

/// Mixer edition advertised in the telemetry frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixerEdition {
    Standard,
    Banana,
    Potato,
    Unknown(u8),
}

impl MixerEdition {
    /// Maps the wire discriminator onto a known edition.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        match value {
            1 => Self::Standard,
            2 => Self::Banana,
            3 => Self::Potato,
            other => Self::Unknown(other),
        }
    }
}

/// One complete, validated telemetry frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub mixer_kind: u8,
    pub frame_counter: u32,
    pub buffer_size: u16,
    pub mixer_version: u32,
    pub option_bits: u32,
    pub sample_rate: u32,
    pub input_levels: [i16; INPUT_CHANNELS],
    pub output_levels: [i16; OUTPUT_CHANNELS],
    pub transport_bits: u32,
    pub strip_state: [u32; STRIP_COUNT],
    pub bus_state: [u32; BUS_COUNT],
    pub strip_gain_layers: [[i16; STRIP_COUNT]; GAIN_LAYERS],
    pub bus_gain: [i16; BUS_COUNT],
    pub strip_labels: [[u8; LABEL_LEN]; STRIP_COUNT],
    pub bus_labels: [[u8; LABEL_LEN]; BUS_COUNT],
}

impl TelemetrySnapshot {
    /// All-zero sentinel held until the first frame arrives.
    pub const EMPTY: Self = Self {
        mixer_kind: 0,
        frame_counter: 0,
        buffer_size: 0,
        mixer_version: 0,
        option_bits: 0,
        sample_rate: 0,
        input_levels: [0; INPUT_CHANNELS],
        output_levels: [0; OUTPUT_CHANNELS],
        transport_bits: 0,
        strip_state: [0; STRIP_COUNT],
        bus_state: [0; BUS_COUNT],
        strip_gain_layers: [[0; STRIP_COUNT]; GAIN_LAYERS],
        bus_gain: [0; BUS_COUNT],
        strip_labels: [[0; LABEL_LEN]; STRIP_COUNT],
        bus_labels: [[0; LABEL_LEN]; BUS_COUNT],
    };

    /// Edition of the mixer that produced this frame.
    #[must_use]
    pub const fn edition(&self) -> MixerEdition {
        MixerEdition::from_byte(self.mixer_kind)
    }

    /// Shifted input level for a meter channel; unknown channels read as silence.
    #[must_use]
    pub fn channel_level(&self, index: usize) -> u16 {
        self.input_levels.get(index).copied().map_or(0, shift_level)
    }

    /// Shifted first-layer gain of a strip.
    #[must_use]
    pub fn strip_gain_level(&self, strip: usize) -> u16 {
        self.strip_gain_layers[0]
            .get(strip)
            .copied()
            .map_or(0, shift_level)
    }

    /// Whether `strip` is routed to bus A`slot + 1`.
    ///
    /// Only the five A-bus bits are defined; any other slot reads `false`.
    #[must_use]
    pub fn routing_enabled(&self, strip: usize, slot: usize) -> bool {
        match (self.strip_state.get(strip), ROUTE_BITS.get(slot)) {
            (Some(word), Some(bit)) => word & bit != 0,
            _ => false,
        }
    }

    /// Strip label up to the first NUL.
    #[must_use]
    pub fn strip_label(&self, strip: usize) -> &str {
        self.strip_labels.get(strip).map_or("", |raw| label_str(raw))
    }

    /// Bus label up to the first NUL.
    #[must_use]
    pub fn bus_label(&self, bus: usize) -> &str {
        self.bus_labels.get(bus).map_or("", |raw| label_str(raw))
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Converts a raw dB×100 reading into the shifted domain, clamping at zero.
#[must_use]
pub fn shift_level(raw: i16) -> u16 {
    let shifted = (i32::from(raw) + LEVEL_FLOOR_OFFSET).max(0);
    u16::try_from(shifted).unwrap_or(u16::MAX)
}

/// Converts a shifted level back into display decibels (zero maps to -60 dB).
#[must_use]
pub fn level_to_db(level: u16) -> f32 {
    f32::from(level) / 100.0 - 60.0
}

fn label_str(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let bytes = &raw[..end];
    match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
    }
}
