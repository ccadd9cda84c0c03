#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use dial_core::pending::DisplayState;
use dial_core::power::{FuelGauge, SensorMode, WakeSource};
use dial_core::settings::KeyValueStore;
use dial_core::time::MonotonicInstant;
use dial_core::ui::touch::RawTouch;
use dial_core::ui::{Frame, UiScreen};
use volume_dial_firmware::hw::{
    Backlight, DatagramSocket, FrameSink, RotationSensor, SleepController, TouchPanel,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MockInstant(pub u64);

impl MonotonicInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

pub const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

#[derive(Default)]
pub struct MockSocket {
    pub local: Option<Ipv4Addr>,
    pub inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<(Vec<u8>, SocketAddrV4)>,
}

impl MockSocket {
    pub fn attached() -> Self {
        Self {
            local: Some(LOCAL),
            ..Self::default()
        }
    }
}

impl DatagramSocket for MockSocket {
    type Error = &'static str;

    fn local_addr(&self) -> Option<Ipv4Addr> {
        self.local
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Some(datagram) = self.inbound.pop_front() else {
            return Ok(None);
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }

    fn send_to(&mut self, payload: &[u8], destination: SocketAddrV4) -> Result<(), Self::Error> {
        self.sent.push((payload.to_vec(), destination));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockStore {
    pub octets: HashMap<String, u8>,
    pub flags: HashMap<String, bool>,
}

impl KeyValueStore for MockStore {
    type Error = &'static str;

    fn get_u8(&mut self, key: &str) -> Result<Option<u8>, Self::Error> {
        Ok(self.octets.get(key).copied())
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), Self::Error> {
        self.octets.insert(key.to_owned(), value);
        Ok(())
    }

    fn get_bool(&mut self, key: &str) -> Result<Option<bool>, Self::Error> {
        Ok(self.flags.get(key).copied())
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), Self::Error> {
        self.flags.insert(key.to_owned(), value);
        Ok(())
    }
}

#[derive(Copy, Clone)]
pub struct MockGauge {
    pub voltage: f32,
    pub percentage: f32,
    pub charge_rate: f32,
}

impl MockGauge {
    pub const DISCHARGING: Self = Self {
        voltage: 3.9,
        percentage: 80.0,
        charge_rate: -4.0,
    };
    pub const CHARGING: Self = Self {
        voltage: 4.1,
        percentage: 90.0,
        charge_rate: 6.0,
    };
    pub const EMPTY: Self = Self {
        voltage: 3.5,
        percentage: 2.0,
        charge_rate: -4.0,
    };
}

impl FuelGauge for MockGauge {
    type Error = &'static str;

    fn voltage(&mut self) -> Result<f32, Self::Error> {
        Ok(self.voltage)
    }

    fn percentage(&mut self) -> Result<f32, Self::Error> {
        Ok(self.percentage)
    }

    fn charge_rate(&mut self) -> Result<f32, Self::Error> {
        Ok(self.charge_rate)
    }
}

#[derive(Default)]
pub struct MockBacklight {
    pub levels: Vec<u8>,
}

impl Backlight for MockBacklight {
    fn set_level(&mut self, level: u8) {
        self.levels.push(level);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SleepCall {
    Sensor(SensorMode),
    RadioOff,
    Suspend(WakeSource),
}

#[derive(Default)]
pub struct MockSleep {
    pub calls: Vec<SleepCall>,
}

impl SleepController for MockSleep {
    fn configure_sensor(&mut self, mode: SensorMode) {
        self.calls.push(SleepCall::Sensor(mode));
    }

    fn disable_radio(&mut self) {
        self.calls.push(SleepCall::RadioOff);
    }

    fn suspend(&mut self, wake: WakeSource) {
        self.calls.push(SleepCall::Suspend(wake));
    }
}

#[derive(Default)]
pub struct MockTouch {
    pub reports: VecDeque<RawTouch>,
}

impl MockTouch {
    /// Queues a controller-reported gesture at panel coordinates.
    pub fn gesture(&mut self, code: u8, x: u16, y: u16) {
        self.reports.push_back(RawTouch {
            gesture_code: code,
            points: 1,
            event: 2,
            x,
            y,
        });
    }
}

impl TouchPanel for MockTouch {
    fn poll(&mut self) -> Option<RawTouch> {
        self.reports.pop_front()
    }
}

#[derive(Default)]
pub struct MockSensor {
    pub samples: VecDeque<(i16, i16)>,
}

impl RotationSensor for MockSensor {
    type Error = &'static str;

    fn read_field(&mut self) -> Result<Option<(i16, i16)>, Self::Error> {
        Ok(self.samples.pop_front())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PresentedFrame {
    pub screen: UiScreen,
    pub connected: bool,
    pub buttons: [[DisplayState; 3]; 3],
    pub db_label: String,
}

#[derive(Default)]
pub struct MockDisplay {
    pub frames: Vec<PresentedFrame>,
}

impl MockDisplay {
    pub fn last(&self) -> &PresentedFrame {
        self.frames.last().expect("no frame presented")
    }
}

impl FrameSink for MockDisplay {
    fn present(&mut self, frame: &Frame<'_>) {
        self.frames.push(PresentedFrame {
            screen: frame.screen,
            connected: frame.connected,
            buttons: frame.buttons,
            db_label: frame.db_label.as_str().to_owned(),
        });
    }
}
