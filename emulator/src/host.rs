//! Host stand-ins for the board peripherals.
//!
//! Everything the terminal and the device threads share lives in one
//! [`HostPanel`]; each adapter below holds an `Arc` to it.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use dial_core::power::{FuelGauge, SensorMode, WakeSource};
use dial_core::settings::KeyValueStore;
use dial_core::ui::Frame;
use dial_core::ui::touch::RawTouch;
use volume_dial_firmware::hw::{
    Backlight, DatagramSocket, FrameSink, Probe, RotationSensor, SleepController, TouchPanel,
};

use crate::terminal;

/// State shared between the terminal and the emulated device.
pub struct HostPanel {
    touches: Mutex<VecDeque<RawTouch>>,
    /// Knob position in tenths of a degree.
    knob_decidegrees: AtomicI32,
    backlight: AtomicU8,
    frame: Mutex<String>,
    charging: AtomicBool,
    radio_on: AtomicBool,
    asleep: Mutex<bool>,
    wake: Condvar,
}

impl HostPanel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            touches: Mutex::new(VecDeque::new()),
            knob_decidegrees: AtomicI32::new(900),
            backlight: AtomicU8::new(0),
            frame: Mutex::new(String::new()),
            charging: AtomicBool::new(true),
            radio_on: AtomicBool::new(true),
            asleep: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub fn push_touch(&self, touch: RawTouch) {
        lock(&self.touches).push_back(touch);
    }

    pub fn turn_knob(&self, degrees: i32) {
        self.knob_decidegrees
            .fetch_add(degrees * 10, Ordering::Relaxed);
    }

    pub fn toggle_charging(&self) {
        self.charging.fetch_xor(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn charging(&self) -> bool {
        self.charging.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn backlight(&self) -> u8 {
        self.backlight.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn radio_on(&self) -> bool {
        self.radio_on.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn asleep(&self) -> bool {
        *lock(&self.asleep)
    }

    #[must_use]
    pub fn frame_text(&self) -> String {
        lock(&self.frame).clone()
    }

    /// Knob interrupt: ends a deep sleep.
    pub fn wake(&self) {
        *lock(&self.asleep) = false;
        self.wake.notify_all();
    }
}

impl Default for HostPanel {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking UDP socket on the loopback network.
pub struct HostSocket {
    socket: UdpSocket,
    panel: Arc<HostPanel>,
}

impl HostSocket {
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub fn bind(local: Ipv4Addr, panel: Arc<HostPanel>) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(local, 0))?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, panel })
    }
}

impl DatagramSocket for HostSocket {
    type Error = io::Error;

    fn local_addr(&self) -> Option<Ipv4Addr> {
        if !self.panel.radio_on() {
            return None;
        }
        match self.socket.local_addr() {
            Ok(SocketAddr::V4(addr)) => Some(*addr.ip()),
            _ => None,
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        match self.socket.recv_from(buf) {
            Ok((len, _)) if self.panel.radio_on() => Ok(Some(len)),
            // Radio off: the datagram is lost.
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn send_to(&mut self, payload: &[u8], destination: SocketAddrV4) -> Result<(), Self::Error> {
        self.socket.send_to(payload, destination).map(|_| ())
    }
}

/// Key/value settings persisted as `key=value` lines.
pub struct FileStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FileStore {
    /// Opens `path`, starting empty when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Fails on read errors other than a missing file.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err),
        };
        let values = contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            .collect();
        Ok(Self { path, values })
    }

    fn put(&mut self, key: &str, value: String) -> io::Result<()> {
        self.values.insert(key.to_owned(), value);
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        let contents: String = keys
            .into_iter()
            .map(|key| format!("{key}={}\n", self.values[key]))
            .collect();
        fs::write(&self.path, contents)
    }
}

impl KeyValueStore for FileStore {
    type Error = io::Error;

    fn get_u8(&mut self, key: &str) -> Result<Option<u8>, Self::Error> {
        Ok(self.values.get(key).and_then(|value| value.parse().ok()))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), Self::Error> {
        self.put(key, value.to_string())
    }

    fn get_bool(&mut self, key: &str) -> Result<Option<bool>, Self::Error> {
        Ok(self.values.get(key).and_then(|value| value.parse().ok()))
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), Self::Error> {
        self.put(key, value.to_string())
    }
}

/// Battery that drains on its own power and charges on the simulated cable.
pub struct SimulatedGauge {
    panel: Arc<HostPanel>,
    percentage: f32,
}

impl SimulatedGauge {
    const RATE_PER_READ: f32 = 0.5;

    #[must_use]
    pub fn new(panel: Arc<HostPanel>, percentage: f32) -> Self {
        Self { panel, percentage }
    }

    fn rate(&self) -> f32 {
        if self.panel.charging() {
            Self::RATE_PER_READ * 60.0
        } else {
            -Self::RATE_PER_READ * 60.0
        }
    }
}

impl FuelGauge for SimulatedGauge {
    type Error = io::Error;

    /// Linear between 3.4 V (empty) and 4.2 V (full).
    fn voltage(&mut self) -> Result<f32, Self::Error> {
        Ok(3.4 + 0.8 * self.percentage / 100.0)
    }

    fn percentage(&mut self) -> Result<f32, Self::Error> {
        let step = if self.panel.charging() {
            Self::RATE_PER_READ
        } else {
            -Self::RATE_PER_READ
        };
        self.percentage = (self.percentage + step).clamp(0.0, 100.0);
        Ok(self.percentage)
    }

    fn charge_rate(&mut self) -> Result<f32, Self::Error> {
        Ok(self.rate())
    }
}

impl Probe for SimulatedGauge {
    type Error = io::Error;

    fn probe(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct PanelBacklight(pub Arc<HostPanel>);

impl Backlight for PanelBacklight {
    fn set_level(&mut self, level: u8) {
        self.0.backlight.store(level, Ordering::Relaxed);
    }
}

pub struct PanelTouch(pub Arc<HostPanel>);

impl TouchPanel for PanelTouch {
    fn poll(&mut self) -> Option<RawTouch> {
        lock(&self.0.touches).pop_front()
    }
}

/// Knob position reported as a magnetometer field sample.
pub struct PanelKnob(pub Arc<HostPanel>);

impl RotationSensor for PanelKnob {
    type Error = io::Error;

    fn read_field(&mut self) -> Result<Option<(i16, i16)>, Self::Error> {
        let decidegrees = self.0.knob_decidegrees.load(Ordering::Relaxed);
        Ok(Some(field_sample(decidegrees)))
    }
}

/// Inverse of the firmware's field angle: angle = atan2(-y, x) + 180.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn field_sample(decidegrees: i32) -> (i16, i16) {
    let radians = (decidegrees as f32 / 10.0 - 180.0).to_radians();
    (
        (radians.cos() * 1_000.0).round() as i16,
        (-radians.sin() * 1_000.0).round() as i16,
    )
}

pub struct PanelDisplay(pub Arc<HostPanel>);

impl FrameSink for PanelDisplay {
    fn present(&mut self, frame: &Frame<'_>) {
        let text = terminal::describe_frame(frame);
        *lock(&self.0.frame) = text;
    }
}

/// Deep sleep blocks the device thread until the knob is touched or the timer fires.
pub struct HostSleep(pub Arc<HostPanel>);

impl SleepController for HostSleep {
    fn configure_sensor(&mut self, mode: SensorMode) {
        eprintln!("sleep: sensor {mode:?}");
    }

    fn disable_radio(&mut self) {
        self.0.radio_on.store(false, Ordering::Relaxed);
    }

    fn suspend(&mut self, wake: WakeSource) {
        let panel = &self.0;
        let mut asleep = lock(&panel.asleep);
        *asleep = true;
        match wake {
            WakeSource::KnobInterrupt => {
                while *asleep {
                    asleep = panel.wake.wait(asleep).unwrap_or_else(PoisonError::into_inner);
                }
            }
            WakeSource::Timer(after) => {
                let (guard, _) = panel
                    .wake
                    .wait_timeout_while(asleep, after, |asleep| *asleep)
                    .unwrap_or_else(PoisonError::into_inner);
                asleep = guard;
                *asleep = false;
            }
        }
        drop(asleep);
        panel.radio_on.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use dial_core::settings::{DeviceSettings, KEY_DESTINATION_OCTET};
    use dial_core::ui::rotation::field_angle;

    #[test]
    fn knob_samples_round_trip_through_field_angle() {
        for degrees in [10, 90, 181, 300] {
            let (x, y) = field_sample(degrees * 10);
            #[allow(clippy::cast_precision_loss)]
            let expected = degrees as f32;
            assert!((field_angle(x, y) - expected).abs() < 0.5, "{degrees}");
        }
    }

    #[test]
    fn file_store_persists_settings() {
        let path = std::env::temp_dir().join(format!("dial-settings-{}.txt", std::process::id()));
        let _ = fs::remove_file(&path);

        let mut store = FileStore::open(path.clone()).unwrap();
        let mut settings = DeviceSettings::load(&mut store).unwrap();
        settings.save_destination(&mut store, 17).unwrap();

        let mut reopened = FileStore::open(path.clone()).unwrap();
        assert_eq!(reopened.get_u8(KEY_DESTINATION_OCTET).unwrap(), Some(17));
        assert_eq!(DeviceSettings::load(&mut reopened).unwrap().destination_octet, 17);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn timer_wake_returns_and_restores_radio() {
        let panel = Arc::new(HostPanel::new());
        let mut sleep = HostSleep(Arc::clone(&panel));
        sleep.disable_radio();
        assert!(!panel.radio_on());
        sleep.suspend(WakeSource::Timer(Duration::from_millis(5)));
        assert!(panel.radio_on());
        assert!(!panel.asleep());
    }
}
