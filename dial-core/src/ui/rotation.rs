//! Knob rotation from magnetometer field samples.

use core::f32::consts::PI;

/// Rotation below this many degrees is treated as sensor noise.
pub const ANGLE_DEADBAND: f32 = 3.0;
/// Degrees of knob travel per dB of gain.
pub const DEGREES_PER_DB: f32 = 9.0;
/// Samples discarded after start-up while the sensor settles.
pub const STARTUP_SAMPLES: u8 = 5;

/// Field angle in degrees, `0..=360`, for a raw X/Y sample.
#[must_use]
pub fn field_angle(x: i16, y: i16) -> f32 {
    let angle = libm::atan2f(-f32::from(y), f32::from(x));
    angle * 180.0 / PI + 180.0
}

/// Wraps an angle difference into `-180..=180`.
#[must_use]
pub fn wrap_degrees(mut delta: f32) -> f32 {
    if delta > 180.0 {
        delta -= 360.0;
    }
    if delta < -180.0 {
        delta += 360.0;
    }
    delta
}

/// Converts knob travel into a gain change.
#[must_use]
pub fn degrees_to_db(degrees: f32) -> f32 {
    degrees / DEGREES_PER_DB
}

/// Turns successive field samples into deadbanded rotation deltas.
#[derive(Copy, Clone, Debug, Default)]
pub struct RotationTracker {
    last_angle: f32,
    settled_samples: u8,
}

impl RotationTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_angle: 0.0,
            settled_samples: 0,
        }
    }

    /// Feeds one sample; returns the rotation in degrees once it clears the deadband.
    pub fn update(&mut self, x: i16, y: i16) -> Option<f32> {
        let angle = field_angle(x, y);
        if self.settled_samples < STARTUP_SAMPLES {
            self.settled_samples += 1;
            self.last_angle = angle;
            return None;
        }

        let delta = wrap_degrees(angle - self.last_angle);
        if delta.abs() > ANGLE_DEADBAND {
            self.last_angle = angle;
            Some(delta)
        } else {
            None
        }
    }

    /// Forgets the reference angle, e.g. after waking from sleep.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
