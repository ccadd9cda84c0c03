//! Wire codec for the mixer's realtime UDP protocol.
//!
//! Three frame shapes cross the link:
//! - the fixed 28-byte registration request that (re)subscribes this device
//!   to the realtime telemetry stream,
//! - text command frames addressed to the `Command1` stream,
//! - inbound 1412-byte telemetry frames.
//!
//! All multi-byte fields are little-endian. Decoding either yields a complete
//! [`TelemetrySnapshot`] or rejects the datagram; nothing is partially applied.

use core::fmt;

use heapless::Vec;

use crate::state::{
    BUS_COUNT, GAIN_LAYERS, INPUT_CHANNELS, LABEL_LEN, OUTPUT_CHANNELS, STRIP_COUNT,
    TelemetrySnapshot,
};

/// Magic prefix carried by every frame.
pub const MAGIC: [u8; 4] = *b"VBAN";
/// Size of the common frame header.
pub const HEADER_LEN: usize = 28;
/// Size of a full telemetry frame, header included.
pub const TELEMETRY_LEN: usize = 1412;
/// Mask selecting the sub-protocol from header byte 4.
pub const PROTOCOL_MASK: u8 = 0xE0;
/// Sub-protocol value for service frames.
pub const PROTOCOL_SERVICE: u8 = 0x60;
/// Sub-protocol tag used for text command frames.
pub const PROTOCOL_TEXT: u8 = 0x40;
/// Service id of a registration request.
pub const SERVICE_RT_REGISTER: u8 = 32;
/// Service id of a telemetry frame.
pub const SERVICE_RT_PACKET: u8 = 33;
/// Stream name the mixer listens on for text commands.
pub const COMMAND_STREAM: &[u8] = b"Command1";
/// Longest command text accepted in a single frame.
pub const MAX_COMMAND_LEN: usize = 64;
/// Buffer size needed for the largest command frame.
pub const COMMAND_FRAME_CAPACITY: usize = HEADER_LEN + MAX_COMMAND_LEN;

const STREAM_NAME_LEN: usize = 16;
const TELEMETRY_STREAM: &[u8] = b"Voicemeeter-RTP";

/// Registration request asking for realtime telemetry for the next interval.
pub const REGISTRATION_REQUEST: [u8; HEADER_LEN] = [
    0x56, 0x42, 0x41, 0x4e, 0x60, 0x00, 0x20, 0x0f, 0x52, 0x65, 0x67, 0x69, 0x73, 0x74, 0x65, 0x72,
    0x20, 0x52, 0x54, 0x50, 0x01, 0x59, 0x41, 0x00, 0x00, 0x00, 0x00, 0x9a,
];

/// Encoded text command ready to transmit.
pub type CommandFrame = Vec<u8, COMMAND_FRAME_CAPACITY>;

/// Reasons a datagram is not accepted as telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Rejected {
    /// Shorter than the common header.
    TooShort(usize),
    /// First four bytes are not the protocol magic.
    BadMagic,
    /// Sub-protocol is not the service class.
    NotService(u8),
    /// Service frame of a kind other than telemetry.
    WrongService(u8),
    /// Header is valid but the telemetry body does not fit.
    Truncated(usize),
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "datagram too short ({len} bytes)"),
            Self::BadMagic => f.write_str("bad magic"),
            Self::NotService(tag) => write!(f, "not a service frame (tag {tag:#04x})"),
            Self::WrongService(id) => write!(f, "unexpected service id {id}"),
            Self::Truncated(len) => write!(f, "telemetry truncated ({len} bytes)"),
        }
    }
}

/// Failure while building an outgoing frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// Command text exceeds [`MAX_COMMAND_LEN`].
    CommandTooLong(usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandTooLong(len) => {
                write!(f, "command of {len} bytes exceeds {MAX_COMMAND_LEN}")
            }
        }
    }
}

/// Returns the registration/keep-alive request frame.
#[must_use]
pub const fn encode_registration_request() -> [u8; HEADER_LEN] {
    REGISTRATION_REQUEST
}

/// Builds command frames, stamping each with a rolling frame counter.
#[derive(Clone, Debug, Default)]
pub struct CommandEncoder {
    frame_counter: u8,
}

impl CommandEncoder {
    #[must_use]
    pub const fn new() -> Self {
        Self { frame_counter: 0 }
    }

    /// Counter value carried by the most recent frame.
    #[must_use]
    pub const fn frame_counter(&self) -> u8 {
        self.frame_counter
    }

    /// Encodes `text` as a command frame.
    ///
    /// The counter advances before use and wraps at 256, so the first frame
    /// carries 1.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::CommandTooLong`] when `text` does not fit.
    pub fn encode(&mut self, text: &str) -> Result<CommandFrame, EncodeError> {
        if text.len() > MAX_COMMAND_LEN {
            return Err(EncodeError::CommandTooLong(text.len()));
        }

        self.frame_counter = self.frame_counter.wrapping_add(1);

        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&MAGIC);
        header[4] = PROTOCOL_TEXT;
        header[7] = 0x10;
        header[8..8 + COMMAND_STREAM.len()].copy_from_slice(COMMAND_STREAM);
        header[24] = self.frame_counter;

        let mut frame = CommandFrame::new();
        frame
            .extend_from_slice(&header)
            .map_err(|_| EncodeError::CommandTooLong(text.len()))?;
        frame
            .extend_from_slice(text.as_bytes())
            .map_err(|_| EncodeError::CommandTooLong(text.len()))?;
        Ok(frame)
    }
}

/// Extracts the command text from an encoded command frame.
#[must_use]
pub fn command_text(frame: &[u8]) -> Option<&str> {
    if frame.len() < HEADER_LEN || frame[..4] != MAGIC || frame[4] != PROTOCOL_TEXT {
        return None;
    }
    core::str::from_utf8(&frame[HEADER_LEN..]).ok()
}

/// Stream name advertised by a command frame, without padding.
#[must_use]
pub fn stream_name(frame: &[u8]) -> &[u8] {
    let Some(raw) = frame.get(8..8 + STREAM_NAME_LEN) else {
        return &[];
    };
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Validates and decodes a telemetry datagram.
///
/// # Errors
///
/// Returns the first [`Rejected`] reason the datagram fails; callers drop
/// rejected datagrams without further handling.
pub fn decode(datagram: &[u8]) -> Result<TelemetrySnapshot, Rejected> {
    if datagram.len() < HEADER_LEN {
        return Err(Rejected::TooShort(datagram.len()));
    }
    if datagram[..4] != MAGIC {
        return Err(Rejected::BadMagic);
    }
    if datagram[4] & PROTOCOL_MASK != PROTOCOL_SERVICE {
        return Err(Rejected::NotService(datagram[4]));
    }
    if datagram[6] != SERVICE_RT_PACKET {
        return Err(Rejected::WrongService(datagram[6]));
    }
    if datagram.len() < TELEMETRY_LEN {
        return Err(Rejected::Truncated(datagram.len()));
    }

    let mut reader = Reader::new(&datagram[..TELEMETRY_LEN], 24);
    let mut snapshot = TelemetrySnapshot::EMPTY;

    snapshot.frame_counter = reader.u32();
    snapshot.mixer_kind = reader.u8();
    reader.skip(1);
    snapshot.buffer_size = reader.u16();
    snapshot.mixer_version = reader.u32();
    snapshot.option_bits = reader.u32();
    snapshot.sample_rate = reader.u32();
    reader.i16s(&mut snapshot.input_levels);
    reader.i16s(&mut snapshot.output_levels);
    snapshot.transport_bits = reader.u32();
    reader.u32s(&mut snapshot.strip_state);
    reader.u32s(&mut snapshot.bus_state);
    for layer in &mut snapshot.strip_gain_layers {
        reader.i16s(layer);
    }
    reader.i16s(&mut snapshot.bus_gain);
    for label in &mut snapshot.strip_labels {
        reader.bytes(label);
    }
    for label in &mut snapshot.bus_labels {
        reader.bytes(label);
    }

    Ok(snapshot)
}

/// Serializes a snapshot into the telemetry wire layout.
///
/// The device never sends telemetry; this exists for the mixer simulator and
/// tests.
#[must_use]
pub fn encode_telemetry(snapshot: &TelemetrySnapshot) -> [u8; TELEMETRY_LEN] {
    let mut frame = [0u8; TELEMETRY_LEN];
    frame[..4].copy_from_slice(&MAGIC);
    frame[4] = PROTOCOL_SERVICE;
    frame[6] = SERVICE_RT_PACKET;
    frame[8..8 + TELEMETRY_STREAM.len()].copy_from_slice(TELEMETRY_STREAM);

    let mut writer = Writer::new(&mut frame, 24);
    writer.u32(snapshot.frame_counter);
    writer.u8(snapshot.mixer_kind);
    writer.skip(1);
    writer.u16(snapshot.buffer_size);
    writer.u32(snapshot.mixer_version);
    writer.u32(snapshot.option_bits);
    writer.u32(snapshot.sample_rate);
    writer.i16s(&snapshot.input_levels);
    writer.i16s(&snapshot.output_levels);
    writer.u32(snapshot.transport_bits);
    writer.u32s(&snapshot.strip_state);
    writer.u32s(&snapshot.bus_state);
    for layer in &snapshot.strip_gain_layers {
        writer.i16s(layer);
    }
    writer.i16s(&snapshot.bus_gain);
    for label in &snapshot.strip_labels {
        writer.bytes(label);
    }
    for label in &snapshot.bus_labels {
        writer.bytes(label);
    }

    frame
}

const _: () = assert!(
    HEADER_LEN
        + 4
        + 2 * (INPUT_CHANNELS + OUTPUT_CHANNELS)
        + 4 * (1 + STRIP_COUNT + BUS_COUNT)
        + 2 * (GAIN_LAYERS * STRIP_COUNT + BUS_COUNT)
        + LABEL_LEN * (STRIP_COUNT + BUS_COUNT)
        + 12
        == TELEMETRY_LEN
);

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        out
    }

    fn skip(&mut self, count: usize) {
        self.offset += count;
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i16s(&mut self, out: &mut [i16]) {
        for value in out {
            *value = i16::from_le_bytes(self.take());
        }
    }

    fn u32s(&mut self, out: &mut [u32]) {
        for value in out {
            *value = self.u32();
        }
    }

    fn bytes(&mut self, out: &mut [u8]) {
        out.copy_from_slice(&self.bytes[self.offset..self.offset + out.len()]);
        self.offset += out.len();
    }
}

struct Writer<'a> {
    bytes: &'a mut [u8],
    offset: usize,
}

impl<'a> Writer<'a> {
    fn new(bytes: &'a mut [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    fn bytes(&mut self, data: &[u8]) {
        self.bytes[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
    }

    fn skip(&mut self, count: usize) {
        self.offset += count;
    }

    fn u8(&mut self, value: u8) {
        self.bytes(&[value]);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn i16s(&mut self, values: &[i16]) {
        for value in values {
            self.bytes(&value.to_le_bytes());
        }
    }

    fn u32s(&mut self, values: &[u32]) {
        for &value in values {
            self.u32(value);
        }
    }
}
