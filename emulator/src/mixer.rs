//! Loopback stand-in for the mixer.
//!
//! Answers registration requests with a stream of telemetry frames and
//! applies the command frames the device sends back, so the whole link can be
//! exercised without a Windows machine on the network.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dial_core::codec::{
    self, HEADER_LEN, MAGIC, PROTOCOL_MASK, PROTOCOL_SERVICE, PROTOCOL_TEXT, SERVICE_RT_REGISTER,
    TELEMETRY_LEN,
};
use dial_core::commands::{GainOp, MixerCommand, parse_script};
use dial_core::state::{LABEL_LEN, ROUTE_BITS, STRIP_COUNT, TelemetrySnapshot};

/// Spacing between telemetry frames while a device is registered.
pub const TELEMETRY_PERIOD: Duration = Duration::from_millis(50);

const STRIP_LABELS: [&str; STRIP_COUNT] = [
    "Mic", "Line", "Aux", "Guitar", "Desk", "Music", "Game", "Chat",
];
const BUS_LABELS: [&str; 8] = ["A1", "A2", "A3", "A4", "A5", "B1", "B2", "B3"];
/// Centi-dB bounds the mixer accepts for a strip fader.
const GAIN_MIN: i16 = -6_000;
const GAIN_MAX: i16 = 1_200;
/// Meter channels animated by [`MockMixer::next_frame`].
const METER_CHANNELS: [usize; 6] = [10, 11, 18, 19, 26, 27];

/// What a received datagram did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handled {
    Registered { ttl: Duration },
    /// Number of statements applied from a command frame.
    Applied(usize),
    Ignored,
}

pub struct MockMixer {
    snapshot: TelemetrySnapshot,
    subscriber: Option<(SocketAddr, Instant)>,
    phase: u32,
}

impl MockMixer {
    #[must_use]
    pub fn new() -> Self {
        let mut snapshot = TelemetrySnapshot::EMPTY;
        snapshot.mixer_kind = 3;
        snapshot.buffer_size = 512;
        snapshot.mixer_version = 0x0302_0001;
        snapshot.sample_rate = 48_000;
        for (slot, label) in snapshot.strip_labels.iter_mut().zip(STRIP_LABELS) {
            copy_label(slot, label);
        }
        for (slot, label) in snapshot.bus_labels.iter_mut().zip(BUS_LABELS) {
            copy_label(slot, label);
        }
        snapshot.strip_state[5] = ROUTE_BITS[0];
        snapshot.strip_state[6] = ROUTE_BITS[0] | ROUTE_BITS[1];
        snapshot.strip_gain_layers[0][7] = -1_200;

        Self {
            snapshot,
            subscriber: None,
            phase: 0,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub const fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// True while a registration is live at `now`.
    #[must_use]
    pub fn has_subscriber(&self, now: Instant) -> bool {
        self.subscriber
            .is_some_and(|(_, expires)| now < expires)
    }

    /// Handles one datagram from `from`.
    pub fn handle_datagram(&mut self, datagram: &[u8], from: SocketAddr, now: Instant) -> Handled {
        if datagram.len() < HEADER_LEN || datagram[..4] != MAGIC {
            return Handled::Ignored;
        }

        if datagram[4] & PROTOCOL_MASK == PROTOCOL_SERVICE && datagram[6] == SERVICE_RT_REGISTER {
            let ttl = Duration::from_secs(u64::from(datagram[7]));
            self.subscriber = Some((from, now + ttl));
            return Handled::Registered { ttl };
        }

        if datagram[4] & PROTOCOL_MASK != PROTOCOL_TEXT
            || codec::stream_name(datagram) != codec::COMMAND_STREAM
        {
            return Handled::Ignored;
        }
        let Some(script) = codec::command_text(datagram) else {
            return Handled::Ignored;
        };
        let mut applied = 0;
        for statement in parse_script(script) {
            match statement {
                Ok(command) => {
                    self.apply(command);
                    applied += 1;
                }
                Err(err) => eprintln!("mixer: {err} in {script:?}"),
            }
        }
        Handled::Applied(applied)
    }

    /// Applies one parsed statement to the mixer state.
    pub fn apply(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::StripGain { strip, op, value } => {
                let Some(gain) = self.snapshot.strip_gain_layers[0].get_mut(usize::from(strip))
                else {
                    return;
                };
                let delta = centi_db(value);
                let updated = match op {
                    GainOp::Add => i32::from(*gain) + delta,
                    GainOp::Sub => i32::from(*gain) - delta,
                    GainOp::Set => delta,
                };
                let clamped = updated.clamp(i32::from(GAIN_MIN), i32::from(GAIN_MAX));
                *gain = i16::try_from(clamped).unwrap_or(GAIN_MIN);
            }
            MixerCommand::StripRoute {
                strip,
                bus,
                enabled,
            } => {
                let bit = usize::from(bus)
                    .checked_sub(1)
                    .and_then(|slot| ROUTE_BITS.get(slot));
                let word = self.snapshot.strip_state.get_mut(usize::from(strip));
                if let (Some(bit), Some(word)) = (bit, word) {
                    if enabled {
                        *word |= bit;
                    } else {
                        *word &= !bit;
                    }
                }
            }
            MixerCommand::ButtonState { button, pressed } => {
                let Some(bit) = 1_u32.checked_shl(u32::from(button)) else {
                    return;
                };
                if pressed {
                    self.snapshot.transport_bits |= bit;
                } else {
                    self.snapshot.transport_bits &= !bit;
                }
            }
        }
    }

    /// Advances the meters and returns the next frame for the subscriber.
    pub fn next_frame(&mut self, now: Instant) -> Option<(SocketAddr, [u8; TELEMETRY_LEN])> {
        let (destination, expires) = self.subscriber?;
        if now >= expires {
            self.subscriber = None;
            return None;
        }

        self.phase = self.phase.wrapping_add(1);
        for (offset, &channel) in METER_CHANNELS.iter().enumerate() {
            self.snapshot.input_levels[channel] = meter_level(self.phase, offset);
        }
        self.snapshot.frame_counter = self.snapshot.frame_counter.wrapping_add(1);
        Some((destination, codec::encode_telemetry(&self.snapshot)))
    }
}

impl Default for MockMixer {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_label(slot: &mut [u8; LABEL_LEN], label: &str) {
    let len = label.len().min(LABEL_LEN);
    slot[..len].copy_from_slice(&label.as_bytes()[..len]);
}

#[allow(clippy::cast_possible_truncation)]
fn centi_db(db: f32) -> i32 {
    (db * 100.0).round() as i32
}

/// Triangle wave between -60 dB and 0 dB, staggered per channel.
fn meter_level(phase: u32, offset: usize) -> i16 {
    let period = 80;
    let shifted = (phase + u32::try_from(offset).unwrap_or(0) * 7) % period;
    let ramp = if shifted < period / 2 {
        shifted
    } else {
        period - shifted
    };
    let level = i32::try_from(ramp).unwrap_or(0) * 6_000 / i32::try_from(period / 2).unwrap_or(1);
    i16::try_from(level - 6_000).unwrap_or(-6_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dial_core::codec::{CommandEncoder, REGISTRATION_REQUEST};
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn device() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 40_000))
    }

    #[test]
    fn registration_starts_stream_until_ttl() {
        let mut mixer = MockMixer::new();
        let start = Instant::now();
        assert!(mixer.next_frame(start).is_none());

        assert_eq!(
            mixer.handle_datagram(&REGISTRATION_REQUEST, device(), start),
            Handled::Registered {
                ttl: Duration::from_secs(15)
            }
        );
        let (to, frame) = mixer.next_frame(start + TELEMETRY_PERIOD).unwrap();
        assert_eq!(to, device());
        let decoded = codec::decode(&frame).unwrap();
        assert_eq!(decoded.strip_label(5), "Music");
        assert_eq!(decoded.frame_counter, 1);

        assert!(mixer.next_frame(start + Duration::from_secs(15)).is_none());
        assert!(!mixer.has_subscriber(start + Duration::from_secs(15)));
    }

    #[test]
    fn command_frames_update_state() {
        let mut mixer = MockMixer::new();
        let mut encoder = CommandEncoder::new();
        let now = Instant::now();

        let frame = encoder.encode("Strip[5].A2 = 1;strip(5).gain -= 3").unwrap();
        assert_eq!(mixer.handle_datagram(&frame, device(), now), Handled::Applied(2));
        assert!(mixer.snapshot().routing_enabled(5, 1));
        assert_eq!(mixer.snapshot().strip_gain_layers[0][5], -300);

        let frame = encoder.encode("Strip[5].A1 = 0").unwrap();
        mixer.handle_datagram(&frame, device(), now);
        assert!(!mixer.snapshot().routing_enabled(5, 0));
    }

    #[test]
    fn foreign_text_streams_are_ignored() {
        let mut mixer = MockMixer::new();
        let mut encoder = CommandEncoder::new();
        let mut frame = encoder.encode("Strip[5].A2 = 1").unwrap();
        frame[8..16].copy_from_slice(b"Command2");

        assert_eq!(
            mixer.handle_datagram(&frame, device(), Instant::now()),
            Handled::Ignored
        );
        assert!(!mixer.snapshot().routing_enabled(5, 1));
    }

    #[test]
    fn gain_is_clamped() {
        let mut mixer = MockMixer::new();
        mixer.apply(MixerCommand::StripGain {
            strip: 6,
            op: GainOp::Add,
            value: 40.0,
        });
        assert_eq!(mixer.snapshot().strip_gain_layers[0][6], GAIN_MAX);
        mixer.apply(MixerCommand::StripGain {
            strip: 6,
            op: GainOp::Set,
            value: -90.0,
        });
        assert_eq!(mixer.snapshot().strip_gain_layers[0][6], GAIN_MIN);
    }

    #[test]
    fn transport_button_press_and_release() {
        let mut mixer = MockMixer::new();
        mixer.apply(MixerCommand::ButtonState {
            button: 0,
            pressed: true,
        });
        assert_eq!(mixer.snapshot().transport_bits, 1);
        mixer.apply(MixerCommand::ButtonState {
            button: 0,
            pressed: false,
        });
        assert_eq!(mixer.snapshot().transport_bits, 0);
    }

    #[test]
    fn meters_stay_in_range() {
        for phase in 0..200 {
            let level = meter_level(phase, 3);
            assert!((-6_000..=0).contains(&level));
        }
    }
}
