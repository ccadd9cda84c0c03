//! Latest mixer telemetry shared across contexts.
//!
//! The network context replaces the snapshot wholesale on every accepted
//! datagram; readers always see one complete frame, never a mix of two.

use core::cell::RefCell;

use dial_core::state::TelemetrySnapshot;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Reader-side copy of the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryView {
    pub snapshot: TelemetrySnapshot,
    pub connected: bool,
    /// Bumped on every snapshot replacement.
    pub generation: u32,
}

impl TelemetryView {
    pub const EMPTY: Self = Self {
        snapshot: TelemetrySnapshot::EMPTY,
        connected: false,
        generation: 0,
    };
}

impl Default for TelemetryView {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Single-writer, multi-reader telemetry holder.
pub struct RemoteStateStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<TelemetryView>>,
}

impl RemoteStateStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(TelemetryView::EMPTY)),
        }
    }

    /// Publishes a freshly decoded snapshot.
    pub fn update(&self, snapshot: TelemetrySnapshot) {
        self.inner.lock(|cell| {
            let mut view = cell.borrow_mut();
            view.snapshot = snapshot;
            view.generation = view.generation.wrapping_add(1);
        });
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock(|cell| cell.borrow_mut().connected = connected);
    }

    #[must_use]
    pub fn connected(&self) -> bool {
        self.inner.lock(|cell| cell.borrow().connected)
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.inner.lock(|cell| cell.borrow().generation)
    }

    /// Returns a full copy of the current view.
    #[must_use]
    pub fn read(&self) -> TelemetryView {
        self.inner.lock(|cell| cell.borrow().clone())
    }

    /// Brings `out` up to date, copying the snapshot only when it changed.
    ///
    /// Returns `true` when a new snapshot was copied.
    pub fn refresh_into(&self, out: &mut TelemetryView) -> bool {
        self.inner.lock(|cell| {
            let view = cell.borrow();
            out.connected = view.connected;
            if out.generation == view.generation {
                return false;
            }
            out.snapshot.clone_from(&view.snapshot);
            out.generation = view.generation;
            true
        })
    }
}

impl Default for RemoteStateStore {
    fn default() -> Self {
        Self::new()
    }
}
