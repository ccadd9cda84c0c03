//! Mixer command vocabulary.
//!
//! The UI only ever emits a handful of ASCII statements: gain nudges, bus
//! routing toggles and a transport button press. Builders format them; the
//! parser reads the same vocabulary back (the mixer simulator and tests use it).

use core::fmt::{self, Write as _};

use winnow::ModalResult;
use winnow::ascii::{Caseless, dec_uint, float, multispace0};
use winnow::combinator::{alt, delimited, preceded, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::literal;

use crate::dispatch::Payload;

/// Gain applied by a single swipe, in dB.
pub const GAIN_STEP_DB: u8 = 3;
/// Highest addressable A-bus.
pub const MAX_BUS: u8 = 5;

/// `strip(N).gain += 3` or `strip(N).gain -= 3`.
#[must_use]
pub fn gain_step(strip: usize, up: bool) -> Payload {
    let op = if up { "+=" } else { "-=" };
    format_payload(format_args!("strip({strip}).gain {op} {GAIN_STEP_DB}"))
}

/// `strip(N).gain += X.XX`; negative deltas keep the `+=` operator.
#[must_use]
pub fn gain_delta(strip: usize, delta_db: f32) -> Payload {
    format_payload(format_args!("strip({strip}).gain += {delta_db:.2}"))
}

/// `Strip[N].A<k> = 0|1` for bus slot `slot` (0 = A1).
#[must_use]
pub fn route(strip: usize, slot: usize, enabled: bool) -> Payload {
    format_payload(format_args!(
        "Strip[{strip}].A{} = {}",
        slot + 1,
        u8::from(enabled)
    ))
}

/// Momentary press of a macro/transport button.
#[must_use]
pub fn transport_button(button: u8) -> Payload {
    format_payload(format_args!(
        "Command.Button[{button}].State = 1;Command.Button[{button}].State = 0;"
    ))
}

/// Parses a destination-octet payload; 0 and 255 are not host addresses.
#[must_use]
pub fn parse_destination_octet(payload: &str) -> Option<u8> {
    payload
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|octet| (1..=254).contains(octet))
}

fn format_payload(args: fmt::Arguments<'_>) -> Payload {
    let mut payload = Payload::new();
    // Every builder output is shorter than the payload bound.
    let _ = payload.write_fmt(args);
    payload
}

/// Gain assignment operator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GainOp {
    Add,
    Sub,
    Set,
}

/// One parsed statement.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MixerCommand {
    StripGain { strip: u8, op: GainOp, value: f32 },
    StripRoute { strip: u8, bus: u8, enabled: bool },
    ButtonState { button: u8, pressed: bool },
}

/// Statement that does not belong to the vocabulary.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    /// Zero-based index of the offending `;`-separated statement.
    pub statement: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized statement #{}", self.statement)
    }
}

/// Parses a `;`-separated script, skipping empty statements.
pub fn parse_script(script: &str) -> impl Iterator<Item = Result<MixerCommand, ParseError>> + '_ {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .enumerate()
        .map(|(index, statement)| parse_statement(statement).ok_or(ParseError { statement: index }))
}

/// Parses a single statement; `None` when it is not part of the vocabulary.
#[must_use]
pub fn parse_statement(statement: &str) -> Option<MixerCommand> {
    alt((strip_statement, button_statement))
        .parse(statement.trim())
        .ok()
}

fn strip_statement(input: &mut &str) -> ModalResult<MixerCommand> {
    let strip = strip_target.parse_next(input)?;
    alt((
        gain_tail.map(|(op, value)| MixerCommand::StripGain { strip, op, value }),
        route_tail.map(|(bus, enabled)| MixerCommand::StripRoute {
            strip,
            bus,
            enabled,
        }),
    ))
    .parse_next(input)
}

fn strip_target(input: &mut &str) -> ModalResult<u8> {
    terminated(
        preceded(
            literal(Caseless("strip")),
            alt((
                delimited('(', dec_uint, ')'),
                delimited('[', dec_uint, ']'),
            )),
        ),
        '.',
    )
    .parse_next(input)
}

fn gain_tail(input: &mut &str) -> ModalResult<(GainOp, f32)> {
    literal(Caseless("gain")).parse_next(input)?;
    let op = padded(alt((
        "+=".value(GainOp::Add),
        "-=".value(GainOp::Sub),
        "=".value(GainOp::Set),
    )))
    .parse_next(input)?;
    let value = float.parse_next(input)?;
    Ok((op, value))
}

fn route_tail(input: &mut &str) -> ModalResult<(u8, bool)> {
    let bus = preceded(literal(Caseless("a")), dec_uint)
        .verify(|bus: &u8| (1..=MAX_BUS).contains(bus))
        .parse_next(input)?;
    let enabled = assignment_flag.parse_next(input)?;
    Ok((bus, enabled))
}

fn button_statement(input: &mut &str) -> ModalResult<MixerCommand> {
    let button = delimited(literal(Caseless("command.button[")), dec_uint, ']').parse_next(input)?;
    literal(Caseless(".state")).parse_next(input)?;
    let pressed = assignment_flag.parse_next(input)?;
    Ok(MixerCommand::ButtonState { button, pressed })
}

fn assignment_flag(input: &mut &str) -> ModalResult<bool> {
    preceded(padded('='), alt(('0'.value(false), '1'.value(true)))).parse_next(input)
}

fn padded<'a, O, P>(parser: P) -> impl Parser<&'a str, O, ErrMode<ContextError>>
where
    P: Parser<&'a str, O, ErrMode<ContextError>>,
{
    delimited(multispace0, parser, multispace0)
}
