//! Terminal front end: keys become touch reports and knob turns, frames
//! become text.

use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use dial_core::pending::DisplayState;
use dial_core::state::{LEVEL_UNITY, MixerEdition};
use dial_core::ui::touch::RawTouch;
use dial_core::ui::{
    ArcView, BUTTON_GAP, BUTTON_SIZE, BatteryView, FIRST_STRIP, Frame, GRID_COLUMNS, GRID_ROWS,
    PANEL_SIZE, UiScreen,
};

const SWIPE_DOWN: u8 = 0x01;
const SWIPE_UP: u8 = 0x02;
const SWIPE_LEFT: u8 = 0x03;
const SWIPE_RIGHT: u8 = 0x04;
const SINGLE_CLICK: u8 = 0x05;
const DOUBLE_CLICK: u8 = 0x0B;
const LONG_PRESS: u8 = 0x0C;

const METER_WIDTH: u32 = 12;

pub const HELP: &str = "arrows swipe | enter click | d double | l long | 1-9 grid cell | [ ] knob | c cable | w wake | q quit";

/// Something the operator asked for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Touch(RawTouch),
    /// Knob travel in whole degrees.
    Turn(i32),
    ToggleCharging,
    Wake,
    Quit,
}

/// Maps a key press to an action.
#[must_use]
pub fn key_action(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    let centre = PANEL_SIZE / 2;
    let action = match key.code {
        KeyCode::Up => gesture(SWIPE_UP, centre, centre),
        KeyCode::Down => gesture(SWIPE_DOWN, centre, centre),
        KeyCode::Left => gesture(SWIPE_LEFT, centre, centre),
        KeyCode::Right => gesture(SWIPE_RIGHT, centre, centre),
        KeyCode::Enter | KeyCode::Char(' ') => gesture(SINGLE_CLICK, centre, centre),
        KeyCode::Char('d') => gesture(DOUBLE_CLICK, centre, centre),
        KeyCode::Char('l') => gesture(LONG_PRESS, centre, centre),
        KeyCode::Char(digit @ '1'..='9') => {
            let index = digit
                .to_digit(10)
                .and_then(|value| usize::try_from(value - 1).ok())
                .unwrap_or(0);
            let (x, y) = cell_centre(index % GRID_COLUMNS, index / GRID_COLUMNS);
            gesture(SINGLE_CLICK, x, y)
        }
        KeyCode::Char('[') => Action::Turn(-9),
        KeyCode::Char(']') => Action::Turn(9),
        KeyCode::Char('{') => Action::Turn(-45),
        KeyCode::Char('}') => Action::Turn(45),
        KeyCode::Char('c') => Action::ToggleCharging,
        KeyCode::Char('w') => Action::Wake,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

const fn gesture(code: u8, x: u16, y: u16) -> Action {
    Action::Touch(RawTouch {
        gesture_code: code,
        points: 1,
        event: 2,
        x,
        y,
    })
}

/// Panel coordinates of a grid cell centre; the panel is mounted mirrored.
fn cell_centre(column: usize, row: usize) -> (u16, u16) {
    let span = BUTTON_SIZE * 3 + BUTTON_GAP * 2;
    let start = (PANEL_SIZE - span) / 2;
    let cell = span / 3;
    let centre = |index: usize| {
        let index = u16::try_from(index).unwrap_or(0);
        PANEL_SIZE - (start + cell * index + cell / 2)
    };
    (centre(column), centre(row))
}

/// Text rendering of one frame.
#[must_use]
pub fn describe_frame(frame: &Frame<'_>) -> String {
    let mut out = String::new();
    let link = if frame.connected { "up" } else { "down" };
    let _ = write!(out, "screen: {:?} | link {link}", frame.screen);
    if frame.connected {
        let _ = write!(out, " | {}", edition_name(frame.mixer));
    }
    if let Some(battery) = &frame.battery {
        describe_battery(&mut out, battery);
    }
    out.push('\n');

    match frame.screen {
        UiScreen::Loading => out.push_str("  connecting to mixer...\n"),
        UiScreen::Disconnected => {
            let _ = writeln!(out, "  mixer at .{} not responding", frame.destination_octet);
        }
        UiScreen::Monitor => {
            for arc in &frame.arcs {
                describe_arc(&mut out, arc);
            }
            let _ = writeln!(out, "  selected gain {}", frame.db_label);
        }
        UiScreen::Outputs => describe_grid(&mut out, frame),
        UiScreen::Settings => {
            let serial = if frame.diagnostic_serial { "on" } else { "off" };
            let _ = writeln!(out, "  mixer address  x.x.x.{}", frame.destination_octet);
            let _ = writeln!(out, "  diagnostic serial  {serial}");
        }
    }
    out
}

fn edition_name(edition: MixerEdition) -> String {
    match edition {
        MixerEdition::Standard => "Voicemeeter".into(),
        MixerEdition::Banana => "Voicemeeter Banana".into(),
        MixerEdition::Potato => "Voicemeeter Potato".into(),
        MixerEdition::Unknown(kind) => format!("mixer kind {kind}"),
    }
}

fn describe_battery(out: &mut String, battery: &BatteryView) {
    let _ = write!(out, " | battery {}%", battery.percentage);
    let target = if battery.charging { "full" } else { "empty" };
    match battery.minutes_remaining {
        Some(minutes) => {
            let _ = write!(out, " ({}h{:02}m to {target})", minutes / 60, minutes % 60);
        }
        None if battery.charging => out.push_str(" (charging)"),
        None => {}
    }
}

fn describe_arc(out: &mut String, arc: &ArcView<'_>) {
    let marker = if arc.selected { '>' } else { ' ' };
    let _ = writeln!(
        out,
        "{marker} [{}] {:<8} {} L {} R {}",
        arc.strip,
        arc.label,
        bar(arc.gain_level),
        bar(arc.left_level),
        bar(arc.right_level),
    );
}

fn describe_grid(out: &mut String, frame: &Frame<'_>) {
    out.push_str("       ");
    for arc in &frame.arcs {
        let _ = write!(out, " {:<6}", arc.label);
    }
    out.push('\n');
    for row in 0..GRID_ROWS {
        let label = frame.bus_labels[row];
        if label.is_empty() {
            let _ = write!(out, "  A{:<4}", row + 1);
        } else {
            let _ = write!(out, "  {label:<5}");
        }
        for cells in &frame.buttons {
            let cell = match cells[row] {
                DisplayState::Actual(true) => "[x]",
                DisplayState::Actual(false) => "[ ]",
                DisplayState::Pending { .. } => "[~]",
            };
            let _ = write!(out, " {cell:<6}");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "  strips {}..{}", FIRST_STRIP, FIRST_STRIP + GRID_COLUMNS - 1);
}

fn bar(level: u16) -> String {
    let filled = (u32::from(level) * METER_WIDTH / u32::from(LEVEL_UNITY)).min(METER_WIDTH);
    (0..METER_WIDTH)
        .map(|index| if index < filled { '#' } else { '.' })
        .collect()
}

/// Redraws the whole screen.
///
/// # Errors
///
/// Propagates terminal write failures.
pub fn draw<W: Write>(out: &mut W, frame_text: &str, status: &str) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for line in frame_text.lines().chain([status, HELP]) {
        queue!(out, Print(line), Print("\r\n"))?;
    }
    out.flush()
}
