//! Backlight ramp that hides visible stepping.

/// Moves the backlight one unit per step toward a target level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BrightnessRamp {
    current: u8,
    target: u8,
}

impl BrightnessRamp {
    #[must_use]
    pub const fn new(initial: u8) -> Self {
        Self {
            current: initial,
            target: initial,
        }
    }

    #[must_use]
    pub const fn current(&self) -> u8 {
        self.current
    }

    #[must_use]
    pub const fn target(&self) -> u8 {
        self.target
    }

    #[must_use]
    pub const fn settled(&self) -> bool {
        self.current == self.target
    }

    /// Sets a new target; `instant` jumps straight to it.
    ///
    /// Returns the level to write to the backlight when it changed.
    pub fn set_target(&mut self, target: u8, instant: bool) -> Option<u8> {
        self.target = target;
        if instant && self.current != target {
            self.current = target;
            Some(target)
        } else {
            None
        }
    }

    /// Advances one unit toward the target.
    ///
    /// Returns the new level, or `None` once settled.
    pub fn step(&mut self) -> Option<u8> {
        match self.current.cmp(&self.target) {
            core::cmp::Ordering::Less => self.current += 1,
            core::cmp::Ordering::Greater => self.current -= 1,
            core::cmp::Ordering::Equal => return None,
        }
        Some(self.current)
    }
}
