//! Optimistic overlay for routing toggles awaiting telemetry confirmation.
//!
//! The mixer never acknowledges a command directly; a toggle shows up only as
//! a later bit flip in the telemetry stream. Each issued toggle therefore
//! parks its expected state in a slot until either the snapshot agrees or
//! [`PENDING_TIMEOUT`] passes, after which the UI falls back to whatever the
//! mixer reports.

use core::time::Duration;

use crate::state::TelemetrySnapshot;
use crate::time::MonotonicInstant;

/// Give-up delay for an unconfirmed toggle.
pub const PENDING_TIMEOUT: Duration = Duration::from_millis(8_000);

/// An issued but unconfirmed toggle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingSlot<I> {
    pub expected_state: bool,
    pub issued_at: I,
}

/// What a grid cell should show.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisplayState {
    /// Waiting for the mixer to report `expected`.
    Pending { expected: bool },
    /// Authoritative state from telemetry.
    Actual(bool),
}

impl DisplayState {
    /// The state the user currently sees, pending or not.
    #[must_use]
    pub const fn shown(self) -> bool {
        match self {
            Self::Pending { expected } => expected,
            Self::Actual(state) => state,
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Pending slots for a `GROUPS × SLOTS` grid of routing toggles.
///
/// Group `g` maps to mixer strip `first_strip + g`; slot `s` maps to bus
/// A`s + 1`.
#[derive(Clone, Debug)]
pub struct PendingCommandTracker<I, const GROUPS: usize, const SLOTS: usize> {
    first_strip: usize,
    timeout: Duration,
    slots: [[Option<PendingSlot<I>>; SLOTS]; GROUPS],
}

impl<I, const GROUPS: usize, const SLOTS: usize> PendingCommandTracker<I, GROUPS, SLOTS>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new(first_strip: usize) -> Self {
        Self::with_timeout(first_strip, PENDING_TIMEOUT)
    }

    #[must_use]
    pub const fn with_timeout(first_strip: usize, timeout: Duration) -> Self {
        Self {
            first_strip,
            timeout,
            slots: [[None; SLOTS]; GROUPS],
        }
    }

    #[must_use]
    pub const fn first_strip(&self) -> usize {
        self.first_strip
    }

    /// Records a freshly issued toggle, replacing any earlier expectation.
    ///
    /// Returns `false` if the coordinates fall outside the grid.
    pub fn mark_pending(&mut self, group: usize, slot: usize, expected_state: bool, now: I) -> bool {
        match self.slot_mut(group, slot) {
            Some(entry) => {
                *entry = Some(PendingSlot {
                    expected_state,
                    issued_at: now,
                });
                true
            }
            None => false,
        }
    }

    /// Clears slots confirmed by `snapshot` or older than the timeout.
    ///
    /// Call once per render pass before reading display state. Returns the
    /// number of slots cleared.
    pub fn reconcile(&mut self, snapshot: &TelemetrySnapshot, now: I) -> usize {
        let first_strip = self.first_strip;
        let timeout = self.timeout;
        let mut cleared = 0;

        for (group, row) in self.slots.iter_mut().enumerate() {
            for (slot, entry) in row.iter_mut().enumerate() {
                let Some(pending) = entry else {
                    continue;
                };
                let actual = snapshot.routing_enabled(first_strip + group, slot);
                let expired = now.saturating_duration_since(pending.issued_at) >= timeout;
                if actual == pending.expected_state || expired {
                    *entry = None;
                    cleared += 1;
                }
            }
        }

        cleared
    }

    #[must_use]
    pub fn slot(&self, group: usize, slot: usize) -> Option<PendingSlot<I>> {
        self.slots.get(group)?.get(slot).copied().flatten()
    }

    #[must_use]
    pub fn is_pending(&self, group: usize, slot: usize) -> bool {
        self.slot(group, slot).is_some()
    }

    /// Overlay-aware state of a grid cell.
    #[must_use]
    pub fn display_state(&self, snapshot: &TelemetrySnapshot, group: usize, slot: usize) -> DisplayState {
        match self.slot(group, slot) {
            Some(pending) => DisplayState::Pending {
                expected: pending.expected_state,
            },
            None => DisplayState::Actual(snapshot.routing_enabled(self.first_strip + group, slot)),
        }
    }

    /// Number of slots still awaiting confirmation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.iter().flatten().filter(|entry| entry.is_some()).count()
    }

    /// Drops every pending slot.
    pub fn clear(&mut self) {
        for entry in self.slots.iter_mut().flatten() {
            *entry = None;
        }
    }

    fn slot_mut(&mut self, group: usize, slot: usize) -> Option<&mut Option<PendingSlot<I>>> {
        self.slots.get_mut(group)?.get_mut(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct MockInstant(u64);

    impl MonotonicInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    type Tracker = PendingCommandTracker<MockInstant, 3, 3>;

    fn routed(strip: usize, bits: u32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::EMPTY;
        snapshot.strip_state[strip] = bits;
        snapshot
    }

    #[test]
    fn pending_overlays_actual_state() {
        let mut tracker = Tracker::new(5);
        let snapshot = TelemetrySnapshot::EMPTY;

        assert_eq!(tracker.display_state(&snapshot, 0, 0), DisplayState::Actual(false));
        assert!(tracker.mark_pending(0, 0, true, MockInstant(0)));
        assert_eq!(
            tracker.display_state(&snapshot, 0, 0),
            DisplayState::Pending { expected: true }
        );
        assert!(tracker.display_state(&snapshot, 0, 0).shown());
    }

    #[test]
    fn unconfirmed_slot_survives_until_timeout() {
        let mut tracker = Tracker::new(5);
        let snapshot = TelemetrySnapshot::EMPTY;
        tracker.mark_pending(1, 2, true, MockInstant(1_000));

        assert_eq!(tracker.reconcile(&snapshot, MockInstant(8_999)), 0);
        assert!(tracker.is_pending(1, 2));
        assert_eq!(tracker.reconcile(&snapshot, MockInstant(9_000)), 1);
        assert!(!tracker.is_pending(1, 2));
    }

    #[test]
    fn confirmation_clears_immediately() {
        let mut tracker = Tracker::new(5);
        tracker.mark_pending(2, 1, true, MockInstant(500));

        // Strip 7, bus A2.
        let snapshot = routed(7, 0x0000_2000);
        assert_eq!(tracker.reconcile(&snapshot, MockInstant(501)), 1);
        assert_eq!(tracker.display_state(&snapshot, 2, 1), DisplayState::Actual(true));
    }

    #[test]
    fn second_toggle_overwrites_and_restarts_timeout() {
        let mut tracker = Tracker::new(5);
        let snapshot = TelemetrySnapshot::EMPTY;
        tracker.mark_pending(0, 1, true, MockInstant(0));
        tracker.mark_pending(0, 1, false, MockInstant(6_000));

        // Expected state now matches the (unrouted) snapshot.
        assert_eq!(tracker.reconcile(&snapshot, MockInstant(6_001)), 1);

        tracker.mark_pending(0, 1, true, MockInstant(7_000));
        tracker.mark_pending(0, 1, true, MockInstant(12_000));
        assert_eq!(tracker.reconcile(&snapshot, MockInstant(15_500)), 0);
        assert_eq!(tracker.slot(0, 1).map(|slot| slot.issued_at), Some(MockInstant(12_000)));
    }

    #[test]
    fn out_of_grid_coordinates_are_ignored() {
        let mut tracker = Tracker::new(5);
        assert!(!tracker.mark_pending(3, 0, true, MockInstant(0)));
        assert!(!tracker.mark_pending(0, 3, true, MockInstant(0)));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn clear_drops_everything() {
        let mut tracker = Tracker::new(5);
        tracker.mark_pending(0, 0, true, MockInstant(0));
        tracker.mark_pending(2, 2, false, MockInstant(0));
        assert_eq!(tracker.pending_count(), 2);
        tracker.clear();
        assert_eq!(tracker.pending_count(), 0);
    }
}
