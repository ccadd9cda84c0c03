//! Screen state machine and input dispatch.
//!
//! Every input reaches the UI as a [`UiEvent`] and is handled by a single
//! [`UiController::handle`] call. The controller owns the pending-toggle
//! overlay and returns at most one [`CommandQueueItem`] per event for the
//! caller to queue.

pub mod frame;
pub mod rotation;
pub mod touch;

use crate::commands;
use crate::dispatch::CommandQueueItem;
use crate::link::DEFAULT_DESTINATION_OCTET;
use crate::pending::PendingCommandTracker;
use crate::state::TelemetrySnapshot;
use crate::time::MonotonicInstant;

pub use frame::{ArcView, BatteryView, Frame};
pub use rotation::RotationTracker;
pub use touch::{Gesture, GestureFilter, RawTouch, TouchEvent};

/// Gain arcs on the monitor screen.
pub const ARC_COUNT: usize = 3;
/// Mixer strip shown by the first arc / grid column.
pub const FIRST_STRIP: usize = 5;
/// Routing grid columns (strips).
pub const GRID_COLUMNS: usize = 3;
/// Routing grid rows (buses A1..).
pub const GRID_ROWS: usize = 3;
/// Square panel edge in pixels.
pub const PANEL_SIZE: u16 = 240;
/// Routing button edge in pixels.
pub const BUTTON_SIZE: u16 = 60;
/// Gap between routing buttons in pixels.
pub const BUTTON_GAP: u16 = 10;
/// Transport button pulsed by a double tap on the monitor screen.
pub const TRANSPORT_BUTTON: u8 = 0;

const GRID_SPAN: u16 = BUTTON_SIZE * 3 + BUTTON_GAP * 2;
const GRID_START: u16 = (PANEL_SIZE - GRID_SPAN) / 2;
const GRID_END: u16 = GRID_START + GRID_SPAN;
const GRID_CELL: u16 = GRID_SPAN / 3;

/// Pending overlay sized for the routing grid.
pub type RoutingOverlay<I> = PendingCommandTracker<I, GRID_COLUMNS, GRID_ROWS>;

/// Top-level screens.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UiScreen {
    /// Boot screen shown until the first connection.
    Loading,
    Disconnected,
    /// Gain arcs for the three strips.
    Monitor,
    /// Routing grid.
    Outputs,
    /// Mixer address and diagnostic options.
    Settings,
}

/// Input delivered to the controller.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UiEvent {
    Touch(TouchEvent),
    /// Knob travel in degrees since the last report.
    Rotate { degrees: f32 },
}

/// UI state owned by the render context.
#[derive(Clone, Debug)]
pub struct UiController<I> {
    screen: UiScreen,
    connected: bool,
    selected_arc: usize,
    overlay: RoutingOverlay<I>,
    destination_octet: u8,
    diagnostic_serial: bool,
}

impl<I> UiController<I>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new(destination_octet: u8, diagnostic_serial: bool) -> Self {
        Self {
            screen: UiScreen::Loading,
            connected: false,
            selected_arc: 0,
            overlay: PendingCommandTracker::new(FIRST_STRIP),
            destination_octet,
            diagnostic_serial,
        }
    }

    #[must_use]
    pub const fn screen(&self) -> UiScreen {
        self.screen
    }

    #[must_use]
    pub const fn selected_arc(&self) -> usize {
        self.selected_arc
    }

    #[must_use]
    pub const fn overlay(&self) -> &RoutingOverlay<I> {
        &self.overlay
    }

    #[must_use]
    pub const fn destination_octet(&self) -> u8 {
        self.destination_octet
    }

    /// Follows the link state; the settings screen stays put so the address
    /// can be fixed while disconnected. Losing the link abandons every
    /// pending toggle.
    pub fn sync_connection(&mut self, connected: bool) {
        if self.connected && !connected {
            self.overlay.clear();
        }
        self.connected = connected;
        self.screen = match (self.screen, connected) {
            (UiScreen::Settings, _) => UiScreen::Settings,
            (UiScreen::Loading, false) => UiScreen::Loading,
            (_, false) => UiScreen::Disconnected,
            (UiScreen::Loading | UiScreen::Disconnected, true) => UiScreen::Monitor,
            (screen, true) => screen,
        };
    }

    /// Drops confirmed or expired pending toggles; call once per render pass.
    pub fn reconcile(&mut self, snapshot: &TelemetrySnapshot, now: I) -> usize {
        self.overlay.reconcile(snapshot, now)
    }

    /// Handles one input and returns the command it produced, if any.
    pub fn handle(
        &mut self,
        event: UiEvent,
        snapshot: &TelemetrySnapshot,
        now: I,
    ) -> Option<CommandQueueItem> {
        match event {
            UiEvent::Touch(touch) => self.handle_touch(touch, snapshot, now),
            UiEvent::Rotate { degrees } => self.handle_rotation(degrees),
        }
    }

    /// Builds the view model for the current screen.
    #[must_use]
    pub fn frame<'a>(
        &self,
        snapshot: &'a TelemetrySnapshot,
        battery: Option<BatteryView>,
    ) -> Frame<'a> {
        let arcs = core::array::from_fn(|index| {
            frame::arc_view(snapshot, index, index == self.selected_arc)
        });
        let buttons = core::array::from_fn(|column| {
            core::array::from_fn(|row| self.overlay.display_state(snapshot, column, row))
        });
        Frame {
            screen: self.screen,
            connected: self.connected,
            mixer: snapshot.edition(),
            arcs,
            db_label: frame::db_label(snapshot.strip_gain_level(self.selected_strip())),
            buttons,
            bus_labels: core::array::from_fn(|row| snapshot.bus_label(row)),
            destination_octet: self.destination_octet,
            diagnostic_serial: self.diagnostic_serial,
            battery,
        }
    }

    fn selected_strip(&self) -> usize {
        FIRST_STRIP + self.selected_arc
    }

    fn handle_touch(
        &mut self,
        touch: TouchEvent,
        snapshot: &TelemetrySnapshot,
        now: I,
    ) -> Option<CommandQueueItem> {
        match (self.screen, touch.gesture) {
            (UiScreen::Monitor, Gesture::SwipeUp) => {
                protocol(&commands::gain_step(self.selected_strip(), true))
            }
            (UiScreen::Monitor, Gesture::SwipeDown) => {
                protocol(&commands::gain_step(self.selected_strip(), false))
            }
            (UiScreen::Monitor, Gesture::SwipeRight) => {
                self.selected_arc = (self.selected_arc + ARC_COUNT - 1) % ARC_COUNT;
                None
            }
            (UiScreen::Monitor, Gesture::SwipeLeft) => {
                self.selected_arc = (self.selected_arc + 1) % ARC_COUNT;
                None
            }
            (UiScreen::Monitor, Gesture::SingleClick) => {
                self.screen = UiScreen::Outputs;
                None
            }
            (UiScreen::Monitor, Gesture::DoubleClick) => {
                protocol(&commands::transport_button(TRANSPORT_BUTTON))
            }
            (UiScreen::Outputs, Gesture::SwipeLeft) => {
                self.screen = UiScreen::Monitor;
                None
            }
            (UiScreen::Outputs, Gesture::SingleClick) => self.toggle_route(touch, snapshot, now),
            (UiScreen::Settings, Gesture::SingleClick) => {
                self.leave_settings();
                Some(CommandQueueItem::destination(self.destination_octet))
            }
            (UiScreen::Settings, Gesture::DoubleClick) => {
                self.diagnostic_serial = !self.diagnostic_serial;
                Some(CommandQueueItem::diagnostic_serial(self.diagnostic_serial))
            }
            (UiScreen::Settings, Gesture::SwipeLeft) => {
                self.leave_settings();
                None
            }
            (UiScreen::Settings, _) => None,
            (_, Gesture::LongPress) => {
                self.screen = UiScreen::Settings;
                None
            }
            _ => None,
        }
    }

    fn handle_rotation(&mut self, degrees: f32) -> Option<CommandQueueItem> {
        match self.screen {
            UiScreen::Monitor => protocol(&commands::gain_delta(
                self.selected_strip(),
                rotation::degrees_to_db(degrees),
            )),
            UiScreen::Settings => {
                self.destination_octet = step_octet(self.destination_octet, degrees > 0.0);
                None
            }
            _ => None,
        }
    }

    fn toggle_route(
        &mut self,
        touch: TouchEvent,
        snapshot: &TelemetrySnapshot,
        now: I,
    ) -> Option<CommandQueueItem> {
        let (column, row) = grid_cell(touch.x, touch.y)?;
        let shown = self.overlay.display_state(snapshot, column, row);
        let enabled = !shown.shown();
        let item = protocol(&commands::route(FIRST_STRIP + column, row, enabled))?;
        self.overlay.mark_pending(column, row, enabled, now);
        Some(item)
    }

    fn leave_settings(&mut self) {
        self.screen = if self.connected {
            UiScreen::Monitor
        } else {
            UiScreen::Disconnected
        };
    }
}

impl<I> Default for UiController<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new(DEFAULT_DESTINATION_OCTET, true)
    }
}

/// Maps a panel touch to a routing grid cell `(column, row)`.
///
/// The panel is mounted upside down, so coordinates are mirrored first.
#[must_use]
pub fn grid_cell(x: u16, y: u16) -> Option<(usize, usize)> {
    let x = PANEL_SIZE.checked_sub(x)?;
    let y = PANEL_SIZE.checked_sub(y)?;
    let column = cell_index(x)?;
    let row = cell_index(y)?;
    Some((column, row))
}

fn cell_index(coordinate: u16) -> Option<usize> {
    if !(GRID_START..=GRID_END).contains(&coordinate) {
        return None;
    }
    let index = usize::from((coordinate - GRID_START) / GRID_CELL);
    (index < GRID_COLUMNS).then_some(index)
}

fn step_octet(octet: u8, up: bool) -> u8 {
    match (octet, up) {
        (254.., true) => 1,
        (..=1, false) => 254,
        (value, true) => value + 1,
        (value, false) => value - 1,
    }
}

fn protocol(payload: &str) -> Option<CommandQueueItem> {
    CommandQueueItem::protocol(payload).ok()
}
