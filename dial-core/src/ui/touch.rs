//! Gesture filtering for the capacitive touch panel.
//!
//! The controller reports its own gesture codes plus raw contact data. The
//! filter turns that into at most one [`TouchEvent`] per report: it
//! synthesizes a click when a finger lifts close to where it landed and
//! throttles bursts of gestures.

use core::time::Duration;

use crate::time::MonotonicInstant;

/// Minimum spacing between accepted gestures.
pub const TOUCH_MIN_INTERVAL: Duration = Duration::from_millis(150);
/// Lift-off within this many pixels of touch-down counts as a click.
pub const TOUCH_DISTANCE_THRESHOLD: u16 = 10;

/// High-level gesture understood by the UI.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Gesture {
    SwipeDown,
    SwipeUp,
    SwipeLeft,
    SwipeRight,
    SingleClick,
    DoubleClick,
    LongPress,
}

impl Gesture {
    /// Maps a CST816-style gesture id; `0x00` and unknown ids carry no gesture.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::SwipeDown),
            0x02 => Some(Self::SwipeUp),
            0x03 => Some(Self::SwipeLeft),
            0x04 => Some(Self::SwipeRight),
            0x05 => Some(Self::SingleClick),
            0x0B => Some(Self::DoubleClick),
            0x0C => Some(Self::LongPress),
            _ => None,
        }
    }
}

/// One report read from the touch controller.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RawTouch {
    pub gesture_code: u8,
    /// Number of fingers on the panel.
    pub points: u8,
    /// Controller event id; `1` marks lift-off.
    pub event: u8,
    pub x: u16,
    pub y: u16,
}

/// Gesture accepted by the filter, with the report's coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TouchEvent {
    pub gesture: Gesture,
    pub x: u16,
    pub y: u16,
}

const LIFT_OFF_EVENT: u8 = 1;

/// Stateful gesture filter.
#[derive(Copy, Clone, Debug)]
pub struct GestureFilter<I> {
    touch_origin: Option<(u16, u16)>,
    last_accepted: Option<I>,
}

impl<I> GestureFilter<I>
where
    I: MonotonicInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            touch_origin: None,
            last_accepted: None,
        }
    }

    /// Feeds one controller report and returns the gesture to act on, if any.
    pub fn next_gesture(&mut self, raw: RawTouch, now: I) -> Option<TouchEvent> {
        if raw.points > 0 && self.touch_origin.is_none() {
            self.touch_origin = Some((raw.x, raw.y));
        }

        let mut gesture = Gesture::from_code(raw.gesture_code);
        if raw.points == 0 && raw.event == LIFT_OFF_EVENT {
            // Every lift ends the contact, whether or not it carried a gesture.
            let origin = self.touch_origin.take().unwrap_or((raw.x, raw.y));
            if gesture.is_none() && within_click_radius(origin, (raw.x, raw.y)) {
                gesture = Some(Gesture::SingleClick);
            }
        }

        let gesture = gesture?;
        if self
            .last_accepted
            .is_some_and(|last| now.saturating_duration_since(last) < TOUCH_MIN_INTERVAL)
        {
            return None;
        }

        self.last_accepted = Some(now);
        Some(TouchEvent {
            gesture,
            x: raw.x,
            y: raw.y,
        })
    }
}

impl<I> Default for GestureFilter<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn within_click_radius(from: (u16, u16), to: (u16, u16)) -> bool {
    let dx = u32::from(from.0.abs_diff(to.0));
    let dy = u32::from(from.1.abs_diff(to.1));
    let radius = u32::from(TOUCH_DISTANCE_THRESHOLD);
    dx * dx + dy * dy < radius * radius
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

    fn down(x: u16, y: u16) -> RawTouch {
        RawTouch {
            points: 1,
            x,
            y,
            ..RawTouch::default()
        }
    }

    fn lift(x: u16, y: u16) -> RawTouch {
        RawTouch {
            event: 1,
            x,
            y,
            ..RawTouch::default()
        }
    }

    #[test]
    fn gesture_codes_map() {
        assert_eq!(Gesture::from_code(0x02), Some(Gesture::SwipeUp));
        assert_eq!(Gesture::from_code(0x0C), Some(Gesture::LongPress));
        assert_eq!(Gesture::from_code(0x00), None);
        assert_eq!(Gesture::from_code(0x07), None);
    }

    #[test]
    fn short_tap_becomes_click() {
        let mut filter = GestureFilter::new();
        assert_eq!(filter.next_gesture(down(100, 100), MockInstant(0)), None);
        assert_eq!(
            filter.next_gesture(lift(104, 105), MockInstant(80)),
            Some(TouchEvent {
                gesture: Gesture::SingleClick,
                x: 104,
                y: 105
            })
        );
    }

    #[test]
    fn drag_without_gesture_is_ignored() {
        let mut filter = GestureFilter::new();
        filter.next_gesture(down(100, 100), MockInstant(0));
        assert_eq!(filter.next_gesture(lift(106, 108), MockInstant(80)), None);
    }

    #[test]
    fn bursts_are_throttled() {
        let mut filter = GestureFilter::new();
        let swipe = RawTouch {
            gesture_code: 0x03,
            points: 1,
            ..RawTouch::default()
        };
        assert!(filter.next_gesture(swipe, MockInstant(1_000)).is_some());
        assert!(filter.next_gesture(swipe, MockInstant(1_149)).is_none());
        assert!(filter.next_gesture(swipe, MockInstant(1_150)).is_some());
    }

    #[test]
    fn lift_with_gesture_clears_origin() {
        let mut filter = GestureFilter::new();
        filter.next_gesture(down(20, 20), MockInstant(0));
        let swipe_lift = RawTouch {
            gesture_code: 0x03,
            ..lift(120, 20)
        };
        assert_eq!(
            filter
                .next_gesture(swipe_lift, MockInstant(100))
                .map(|event| event.gesture),
            Some(Gesture::SwipeLeft)
        );

        filter.next_gesture(down(200, 200), MockInstant(500));
        assert_eq!(
            filter
                .next_gesture(lift(201, 199), MockInstant(550))
                .map(|event| event.gesture),
            Some(Gesture::SingleClick)
        );
    }

    #[test]
    fn throttled_lift_still_clears_origin() {
        let mut filter = GestureFilter::new();
        filter.next_gesture(down(50, 50), MockInstant(0));
        assert!(filter.next_gesture(lift(50, 50), MockInstant(40)).is_some());

        // Lands inside the throttle window with a gesture code, so it is dropped.
        filter.next_gesture(down(10, 10), MockInstant(60));
        let long_lift = RawTouch {
            gesture_code: 0x0C,
            ..lift(10, 10)
        };
        assert_eq!(filter.next_gesture(long_lift, MockInstant(100)), None);

        filter.next_gesture(down(180, 60), MockInstant(400));
        assert_eq!(
            filter
                .next_gesture(lift(182, 61), MockInstant(450))
                .map(|event| event.gesture),
            Some(Gesture::SingleClick)
        );
    }

    #[test]
    fn origin_resets_after_each_lift() {
        let mut filter = GestureFilter::new();
        filter.next_gesture(down(10, 10), MockInstant(0));
        filter.next_gesture(lift(10, 10), MockInstant(50));
        filter.next_gesture(down(200, 200), MockInstant(400));
        assert_eq!(
            filter
                .next_gesture(lift(201, 199), MockInstant(450))
                .map(|event| event.gesture),
            Some(Gesture::SingleClick)
        );
    }
}
