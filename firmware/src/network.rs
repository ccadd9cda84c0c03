//! Network context: telemetry intake, command egress, link liveness.
//!
//! One [`NetworkContext::poll`] per iteration of the network loop. It is the
//! only writer of the telemetry store and the only reader of the command
//! queue.

use core::fmt::Debug;
use core::net::Ipv4Addr;

use dial_core::codec::{self, CommandEncoder, REGISTRATION_REQUEST};
use dial_core::commands::parse_destination_octet;
use dial_core::dispatch::{CommandKind, CommandQueueItem};
use dial_core::link::{ConnectionMonitor, DestinationTracker, LinkConfig, LinkTransition};
use dial_core::settings::{DeviceSettings, KeyValueStore};
use dial_core::time::MonotonicInstant;

use crate::SharedState;
use crate::hw::DatagramSocket;

/// Large enough for any datagram on a standard MTU.
pub const RECEIVE_BUFFER_LEN: usize = 1_500;
/// Upper bound on datagrams consumed per poll so egress is never starved.
pub const MAX_DATAGRAMS_PER_POLL: usize = 8;

/// What one poll did.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkActivity {
    /// Telemetry frames accepted.
    pub accepted: usize,
    /// Datagrams that failed validation.
    pub rejected: usize,
    /// Queue items handled.
    pub commands: usize,
    pub keep_alive_sent: bool,
    pub transition: LinkTransition,
}

impl NetworkActivity {
    /// `true` when nothing arrived and nothing was sent.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.accepted == 0 && self.rejected == 0 && self.commands == 0 && !self.keep_alive_sent
    }
}

pub struct NetworkContext<I, S, K> {
    socket: S,
    store: K,
    settings: DeviceSettings,
    config: LinkConfig,
    destination: DestinationTracker,
    encoder: CommandEncoder,
    monitor: ConnectionMonitor<I>,
    last_keep_alive: Option<I>,
    rx: [u8; RECEIVE_BUFFER_LEN],
}

impl<I, S, K> NetworkContext<I, S, K>
where
    I: MonotonicInstant,
    S: DatagramSocket,
    S::Error: Debug,
    K: KeyValueStore,
    K::Error: Debug,
{
    /// Starts from settings loaded at boot; a keep-alive goes out on the first poll.
    #[must_use]
    pub const fn new(socket: S, store: K, settings: DeviceSettings, config: LinkConfig) -> Self {
        Self {
            socket,
            store,
            settings,
            config,
            destination: DestinationTracker::new(settings.destination_octet),
            encoder: CommandEncoder::new(),
            monitor: ConnectionMonitor::new(config.liveness_window),
            last_keep_alive: None,
            rx: [0; RECEIVE_BUFFER_LEN],
        }
    }

    #[must_use]
    pub const fn monitor(&self) -> &ConnectionMonitor<I> {
        &self.monitor
    }

    #[must_use]
    pub const fn destination(&self) -> &DestinationTracker {
        &self.destination
    }

    #[must_use]
    pub const fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    #[must_use]
    pub const fn socket(&self) -> &S {
        &self.socket
    }

    pub const fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    #[must_use]
    pub const fn store(&self) -> &K {
        &self.store
    }

    /// Runs one iteration: receive, drain commands, keep-alive, liveness.
    pub fn poll(&mut self, shared: &SharedState, now: I) -> NetworkActivity {
        let local = self.socket.local_addr();
        self.monitor.set_attached(local.is_some());

        let mut activity = NetworkActivity::default();
        self.receive(shared, now, &mut activity);

        let drained = shared.commands.drain_all();
        activity.commands = drained.len();
        for item in &drained {
            self.dispatch(item, local);
        }

        activity.keep_alive_sent = self.keep_alive(local, now);

        activity.transition = self.monitor.refresh(now);
        match activity.transition {
            LinkTransition::Connected => log::link("connected", self.destination.octet()),
            LinkTransition::Lost => log::link("lost", self.destination.octet()),
            LinkTransition::Unchanged => {}
        }
        shared.telemetry.set_connected(self.monitor.is_connected(now));
        activity
    }

    fn receive(&mut self, shared: &SharedState, now: I, activity: &mut NetworkActivity) {
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            let len = match self.socket.try_recv(&mut self.rx) {
                Ok(Some(len)) => len.min(RECEIVE_BUFFER_LEN),
                Ok(None) => break,
                Err(err) => {
                    log::socket_error("receive", &err);
                    break;
                }
            };

            let Ok(snapshot) = codec::decode(&self.rx[..len]) else {
                activity.rejected += 1;
                continue;
            };
            self.monitor.record_packet(now);
            shared.telemetry.update(snapshot);
            activity.accepted += 1;

            if let Some(octet) = self.destination.confirm() {
                match self.settings.save_destination(&mut self.store, octet) {
                    Ok(()) => log::destination("confirmed", octet),
                    Err(err) => log::settings_error(&err),
                }
            }
        }
    }

    fn dispatch(&mut self, item: &CommandQueueItem, local: Option<Ipv4Addr>) {
        match item.kind {
            CommandKind::SendProtocolCommand => {
                let Some(local) = local else {
                    log::detached();
                    return;
                };
                match self.encoder.encode(&item.payload) {
                    Ok(frame) => self.send(&frame, local),
                    Err(err) => log::encode_error(err),
                }
            }
            CommandKind::SetDestinationAddress => match parse_destination_octet(&item.payload) {
                Some(octet) => {
                    if self.destination.retarget(octet) {
                        log::destination("retarget", octet);
                        self.last_keep_alive = None;
                    }
                }
                None => log::invalid_destination(),
            },
            CommandKind::SetDiagnosticSerial => {
                let enabled = item.payload.as_str() == "1";
                if let Err(err) = self.settings.save_diagnostic_serial(&mut self.store, enabled) {
                    log::settings_error(&err);
                }
            }
        }
    }

    fn keep_alive(&mut self, local: Option<Ipv4Addr>, now: I) -> bool {
        let Some(local) = local else {
            return false;
        };
        let due = self.last_keep_alive.is_none_or(|last| {
            now.saturating_duration_since(last) >= self.config.keep_alive_interval
        });
        if !due {
            return false;
        }
        self.send(&REGISTRATION_REQUEST, local);
        self.last_keep_alive = Some(now);
        true
    }

    fn send(&mut self, payload: &[u8], local: Ipv4Addr) {
        let destination = self.destination.resolve(local, self.config.port);
        if let Err(err) = self.socket.send_to(payload, destination) {
            log::socket_error("send", &err);
        }
    }
}

#[cfg(target_os = "none")]
mod log {
    use core::fmt::Debug;

    use dial_core::codec::EncodeError;

    pub(super) fn link(state: &'static str, octet: u8) {
        defmt::info!("network: link {} (mixer .{})", state, octet);
    }

    pub(super) fn destination(action: &'static str, octet: u8) {
        defmt::info!("network: destination {} .{}", action, octet);
    }

    pub(super) fn socket_error<E: Debug>(op: &'static str, err: &E) {
        defmt::warn!("network: {} failed: {}", op, defmt::Debug2Format(err));
    }

    pub(super) fn settings_error<E: Debug>(err: &E) {
        defmt::warn!("network: settings write failed: {}", defmt::Debug2Format(err));
    }

    pub(super) fn encode_error(err: EncodeError) {
        defmt::warn!("network: {}", defmt::Display2Format(&err));
    }

    pub(super) fn detached() {
        defmt::warn!("network: not attached, command dropped");
    }

    pub(super) fn invalid_destination() {
        defmt::warn!("network: ignoring invalid destination octet");
    }
}

#[cfg(not(target_os = "none"))]
mod log {
    use core::fmt::Debug;

    use dial_core::codec::EncodeError;

    pub(super) fn link(state: &'static str, octet: u8) {
        println!("network: link {state} (mixer .{octet})");
    }

    pub(super) fn destination(action: &'static str, octet: u8) {
        println!("network: destination {action} .{octet}");
    }

    pub(super) fn socket_error<E: Debug>(op: &'static str, err: &E) {
        println!("network: {op} failed: {err:?}");
    }

    pub(super) fn settings_error<E: Debug>(err: &E) {
        println!("network: settings write failed: {err:?}");
    }

    pub(super) fn encode_error(err: EncodeError) {
        println!("network: {err}");
    }

    pub(super) fn detached() {
        println!("network: not attached, command dropped");
    }

    pub(super) fn invalid_destination() {
        println!("network: ignoring invalid destination octet");
    }
}
