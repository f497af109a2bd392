//! Operator input: button edge tracking over the raw gamepad bitset

use bitflags::bitflags;

bitflags! {
    /// Discrete gamepad buttons
    pub struct Buttons: u16 {
        const A     = 1 << 0;
        const B     = 1 << 1;
        const X     = 1 << 2;
        const Y     = 1 << 3;
        const UP    = 1 << 4;
        const DOWN  = 1 << 5;
        const LEFT  = 1 << 6;
        const RIGHT = 1 << 7;
        const L1    = 1 << 8;
        const L2    = 1 << 9;
        const R1    = 1 << 10;
        const R2    = 1 << 11;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Buttons::empty()
    }
}

/// Analog stick axes, values in percent deflection
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

/// Edge detection over the raw button bitset
///
/// `update` must run exactly once per cycle, before any state logic reads
/// edges, so that a press is observed as a single edge.
#[derive(Debug, Default)]
pub struct ButtonTracker {
    previous: Buttons,
    current: Buttons,
    pressed: Buttons,
    released: Buttons,
}

impl ButtonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, now: Buttons) {
        self.previous = self.current;
        self.current = now;
        self.pressed = now & !self.previous;
        self.released = self.previous & !now;
    }

    /// Whether the button is currently held down
    pub fn pressing(&self, button: Buttons) -> bool {
        self.current.contains(button)
    }

    /// Whether the button went down since the last cycle
    pub fn pressed(&self, button: Buttons) -> bool {
        self.pressed.contains(button)
    }

    /// Whether the button was let go since the last cycle
    pub fn released(&self, button: Buttons) -> bool {
        self.released.contains(button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once() {
        let mut tracker = ButtonTracker::new();
        tracker.update(Buttons::A);
        assert!(tracker.pressed(Buttons::A));
        assert!(tracker.pressing(Buttons::A));

        tracker.update(Buttons::A);
        assert!(!tracker.pressed(Buttons::A));
        assert!(tracker.pressing(Buttons::A));

        tracker.update(Buttons::empty());
        assert!(tracker.released(Buttons::A));
        assert!(!tracker.pressing(Buttons::A));
    }

    #[test]
    fn simultaneous_buttons_tracked_independently() {
        let mut tracker = ButtonTracker::new();
        tracker.update(Buttons::A | Buttons::X);
        tracker.update(Buttons::X);
        assert!(tracker.released(Buttons::A));
        assert!(!tracker.released(Buttons::X));
        assert!(tracker.pressing(Buttons::X));
    }
}
