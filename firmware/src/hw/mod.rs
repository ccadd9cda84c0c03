//! Board seams.
//!
//! Each peripheral the contexts touch is a small trait so the same context
//! code runs against the real board and against the emulator's stand-ins.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;

use dial_core::power::{SensorMode, WakeSource};
use dial_core::ui::frame::Frame;
use dial_core::ui::touch::RawTouch;

/// Delay between presence probes during start-up.
pub const PROBE_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Non-blocking UDP endpoint bound to the mixer port.
pub trait DatagramSocket {
    type Error;

    /// Local address while attached to a network, `None` otherwise.
    fn local_addr(&self) -> Option<Ipv4Addr>;

    /// Copies the next pending datagram into `buf`; `Ok(None)` when none is waiting.
    ///
    /// # Errors
    ///
    /// Reports driver failures.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// # Errors
    ///
    /// Reports driver failures.
    fn send_to(&mut self, payload: &[u8], destination: SocketAddrV4) -> Result<(), Self::Error>;
}

/// Capacitive touch controller.
pub trait TouchPanel {
    /// Returns a report when the controller flagged new data.
    fn poll(&mut self) -> Option<RawTouch>;
}

/// Magnetometer under the knob.
pub trait RotationSensor {
    type Error;

    /// Latest X/Y field sample, `Ok(None)` when no new sample is ready.
    ///
    /// # Errors
    ///
    /// Reports bus failures.
    fn read_field(&mut self) -> Result<Option<(i16, i16)>, Self::Error>;
}

/// Display driver.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame<'_>);
}

/// Backlight PWM.
pub trait Backlight {
    fn set_level(&mut self, level: u8);
}

/// Deep sleep entry.
pub trait SleepController {
    /// Puts the rotation sensor into the requested low-power state.
    fn configure_sensor(&mut self, mode: SensorMode);
    fn disable_radio(&mut self);
    /// Enters deep sleep; on target wake-up is a reset and this never returns.
    fn suspend(&mut self, wake: WakeSource);
}

/// Peripheral that can be probed for presence on its bus.
pub trait Probe {
    type Error;

    /// # Errors
    ///
    /// Returns the bus error while the device does not answer.
    fn probe(&mut self) -> Result<(), Self::Error>;
}

/// Probes `device` until it answers, calling `delay` between attempts.
///
/// Returns the number of attempts it took.
pub fn wait_until_present<P, D>(device: &mut P, name: &'static str, mut delay: D) -> u32
where
    P: Probe,
    D: FnMut(Duration),
{
    let mut attempts = 1;
    while !probe_attempt(device, name, attempts) {
        delay(PROBE_RETRY_INTERVAL);
        attempts += 1;
    }
    attempts
}

/// Probes once and logs the outcome; shared by the blocking and async waits.
pub(crate) fn probe_attempt<P: Probe>(device: &mut P, name: &'static str, attempt: u32) -> bool {
    let present = device.probe().is_ok();
    if present {
        log_present(name, attempt);
    } else {
        log_missing(name, attempt);
    }
    present
}

#[cfg(target_os = "none")]
fn log_missing(name: &'static str, attempt: u32) {
    defmt::warn!("hw: {} not detected (attempt {})", name, attempt);
}

#[cfg(not(target_os = "none"))]
fn log_missing(name: &'static str, attempt: u32) {
    println!("hw: {name} not detected (attempt {attempt})");
}

#[cfg(target_os = "none")]
fn log_present(name: &'static str, attempt: u32) {
    defmt::info!("hw: {} ready after {} attempt(s)", name, attempt);
}

#[cfg(not(target_os = "none"))]
fn log_present(name: &'static str, attempt: u32) {
    println!("hw: {name} ready after {attempt} attempt(s)");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        failures_left: u8,
    }

    impl Probe for Flaky {
        type Error = ();

        fn probe(&mut self) -> Result<(), Self::Error> {
            if self.failures_left == 0 {
                Ok(())
            } else {
                self.failures_left -= 1;
                Err(())
            }
        }
    }

    #[test]
    fn single_attempt_reports_presence() {
        let mut gauge = Flaky { failures_left: 1 };
        assert!(!probe_attempt(&mut gauge, "gauge", 1));
        assert!(probe_attempt(&mut gauge, "gauge", 2));
    }

    #[test]
    fn retries_until_present() {
        let mut gauge = Flaky { failures_left: 2 };
        let mut waited = Duration::ZERO;
        let attempts = wait_until_present(&mut gauge, "gauge", |delay| waited += delay);
        assert_eq!(attempts, 3);
        assert_eq!(waited, PROBE_RETRY_INTERVAL * 2);
    }
}
