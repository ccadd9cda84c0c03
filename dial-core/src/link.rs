//! Link liveness and mixer addressing.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;

use crate::time::MonotonicInstant;

/// UDP port used by the mixer and by this device.
pub const MIXER_PORT: u16 = 6980;
/// Last octet of the mixer address when nothing has been persisted.
pub const DEFAULT_DESTINATION_OCTET: u8 = 2;

/// Timing knobs for the mixer link.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkConfig {
    /// Longest gap between telemetry frames before the link counts as lost.
    pub liveness_window: Duration,
    /// Cadence of the registration/keep-alive request.
    pub keep_alive_interval: Duration,
    pub port: u16,
}

impl LinkConfig {
    pub const DEFAULT: Self = Self {
        liveness_window: Duration::from_millis(5_000),
        keep_alive_interval: Duration::from_secs(10),
        port: MIXER_PORT,
    };
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Edge reported by [`ConnectionMonitor::refresh`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LinkTransition {
    #[default]
    Unchanged,
    Connected,
    Lost,
}

/// Derives connection status from telemetry arrival times.
///
/// The monitor never polls on its own; the receive path feeds it packet
/// timestamps and the owning loop asks it questions about `now`.
#[derive(Copy, Clone, Debug)]
pub struct ConnectionMonitor<I> {
    liveness_window: Duration,
    attached: bool,
    last_packet_at: Option<I>,
    connection_started_at: Option<I>,
    reported_connected: bool,
}

impl<I> ConnectionMonitor<I>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new(liveness_window: Duration) -> Self {
        Self {
            liveness_window,
            attached: true,
            last_packet_at: None,
            connection_started_at: None,
            reported_connected: false,
        }
    }

    /// Records arrival of a valid telemetry frame.
    pub fn record_packet(&mut self, now: I) {
        if !self.is_connected(now) {
            self.connection_started_at = Some(now);
        }
        self.last_packet_at = Some(now);
    }

    /// Updates the transport attachment flag (Wi-Fi association on target).
    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    #[must_use]
    pub const fn attached(&self) -> bool {
        self.attached
    }

    /// Whether a frame arrived within the liveness window and the transport is up.
    #[must_use]
    pub fn is_connected(&self, now: I) -> bool {
        self.attached
            && self
                .last_packet_at
                .is_some_and(|last| now.saturating_duration_since(last) < self.liveness_window)
    }

    /// Reports edges since the previous call and clears the session start
    /// once the link is gone.
    pub fn refresh(&mut self, now: I) -> LinkTransition {
        let connected = self.is_connected(now);
        if connected == self.reported_connected {
            return LinkTransition::Unchanged;
        }
        self.reported_connected = connected;
        if connected {
            if self.connection_started_at.is_none() {
                self.connection_started_at = self.last_packet_at;
            }
            LinkTransition::Connected
        } else {
            self.connection_started_at = None;
            LinkTransition::Lost
        }
    }

    #[must_use]
    pub const fn last_packet_at(&self) -> Option<I> {
        self.last_packet_at
    }

    #[must_use]
    pub const fn connection_started_at(&self) -> Option<I> {
        self.connection_started_at
    }

    /// Time since the last valid frame, `None` when none ever arrived.
    #[must_use]
    pub fn since_last_packet(&self, now: I) -> Option<Duration> {
        self.last_packet_at
            .map(|last| now.saturating_duration_since(last))
    }

    /// Time since the current session began, `None` while disconnected.
    #[must_use]
    pub fn since_connection_start(&self, now: I) -> Option<Duration> {
        if !self.is_connected(now) {
            return None;
        }
        self.connection_started_at
            .map(|start| now.saturating_duration_since(start))
    }
}

/// Tracks the mixer's last address octet and whether a change still awaits
/// confirmation by inbound telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DestinationTracker {
    octet: u8,
    unconfirmed: bool,
}

impl DestinationTracker {
    /// Starts from a persisted (already confirmed) octet.
    #[must_use]
    pub const fn new(octet: u8) -> Self {
        Self {
            octet,
            unconfirmed: false,
        }
    }

    #[must_use]
    pub const fn octet(&self) -> u8 {
        self.octet
    }

    #[must_use]
    pub const fn is_unconfirmed(&self) -> bool {
        self.unconfirmed
    }

    /// Switches to a new octet; returns `false` when it is unchanged.
    pub fn retarget(&mut self, octet: u8) -> bool {
        if octet == self.octet && !self.unconfirmed {
            return false;
        }
        self.octet = octet;
        self.unconfirmed = true;
        true
    }

    /// Called on every valid frame; yields the octet once so it can be persisted.
    pub fn confirm(&mut self) -> Option<u8> {
        if self.unconfirmed {
            self.unconfirmed = false;
            Some(self.octet)
        } else {
            None
        }
    }

    /// Mixer address on the device's own /24.
    #[must_use]
    pub fn resolve(&self, local: Ipv4Addr, port: u16) -> SocketAddrV4 {
        let [a, b, c, _] = local.octets();
        SocketAddrV4::new(Ipv4Addr::new(a, b, c, self.octet), port)
    }
}

impl Default for DestinationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DESTINATION_OCTET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct MockInstant(u64);

    impl MockInstant {
        fn millis(value: u64) -> Self {
            Self(value)
        }
    }

    impl MonotonicInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    fn monitor() -> ConnectionMonitor<MockInstant> {
        ConnectionMonitor::new(LinkConfig::DEFAULT.liveness_window)
    }

    #[test]
    fn never_connected_without_packets() {
        let mut monitor = monitor();
        assert!(!monitor.is_connected(MockInstant::millis(0)));
        assert_eq!(monitor.refresh(MockInstant::millis(100)), LinkTransition::Unchanged);
        assert_eq!(monitor.since_last_packet(MockInstant::millis(100)), None);
        assert_eq!(monitor.since_connection_start(MockInstant::millis(100)), None);
    }

    #[test]
    fn liveness_window_boundary() {
        let mut monitor = monitor();
        monitor.record_packet(MockInstant::millis(1_000));

        assert!(monitor.is_connected(MockInstant::millis(5_999)));
        assert!(!monitor.is_connected(MockInstant::millis(6_000)));
    }

    #[test]
    fn session_start_survives_steady_stream_and_resets_after_gap() {
        let mut monitor = monitor();
        monitor.record_packet(MockInstant::millis(100));
        assert_eq!(monitor.refresh(MockInstant::millis(100)), LinkTransition::Connected);
        assert_eq!(monitor.refresh(MockInstant::millis(150)), LinkTransition::Unchanged);
        monitor.record_packet(MockInstant::millis(2_000));
        monitor.record_packet(MockInstant::millis(4_000));

        assert_eq!(
            monitor.since_connection_start(MockInstant::millis(4_500)),
            Some(Duration::from_millis(4_400))
        );

        assert_eq!(monitor.refresh(MockInstant::millis(9_500)), LinkTransition::Lost);
        assert_eq!(monitor.connection_started_at(), None);

        monitor.record_packet(MockInstant::millis(12_000));
        assert_eq!(monitor.connection_started_at(), Some(MockInstant::millis(12_000)));
        assert_eq!(
            monitor.since_last_packet(MockInstant::millis(12_250)),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn detached_transport_forces_disconnect() {
        let mut monitor = monitor();
        monitor.record_packet(MockInstant::millis(0));
        assert_eq!(monitor.refresh(MockInstant::millis(0)), LinkTransition::Connected);
        monitor.set_attached(false);

        assert!(!monitor.is_connected(MockInstant::millis(10)));
        assert_eq!(monitor.refresh(MockInstant::millis(10)), LinkTransition::Lost);

        monitor.set_attached(true);
        assert_eq!(monitor.refresh(MockInstant::millis(20)), LinkTransition::Connected);
        assert_eq!(monitor.connection_started_at(), Some(MockInstant::millis(0)));
    }

    #[test]
    fn destination_confirms_once() {
        let mut tracker = DestinationTracker::default();
        assert_eq!(tracker.confirm(), None);
        assert!(!tracker.retarget(DEFAULT_DESTINATION_OCTET));

        assert!(tracker.retarget(42));
        assert!(tracker.is_unconfirmed());
        assert_eq!(tracker.confirm(), Some(42));
        assert_eq!(tracker.confirm(), None);
    }

    #[test]
    fn destination_uses_local_prefix() {
        let tracker = DestinationTracker::new(17);
        let addr = tracker.resolve(Ipv4Addr::new(192, 168, 4, 88), MIXER_PORT);
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::new(192, 168, 4, 17), 6980));
    }
}
