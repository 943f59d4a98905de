/// Immutable per-poll capture of one controller slot.
///
/// The contract callers rely on: if `connected` is false, every other field
/// is its zero/default value, so code can read axes or button state without
/// checking `connected` first. The disconnected value is a single shared
/// static — it is constructed once and never mutated. Connected snapshots
/// are freshly built, one per poll.

use crate::backend::{Axes, SensorReading, TouchFinger};
use crate::buttons::Button;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Whether a device was bound and readable at the instant of the poll.
    pub connected: bool,
    /// Display name of the device, empty when disconnected.
    pub name: String,
    /// Raw axis values (sticks -1..1, triggers 0..1).
    pub axes: Axes,
    /// Left stick direction in degrees (0 = right, 90 = up).
    pub left_stick_angle: f32,
    /// Left stick deflection. Usually 0..1 but not clamped — square-gate
    /// pads exceed unit length in the corners.
    pub left_stick_magnitude: f32,
    pub right_stick_angle: f32,
    pub right_stick_magnitude: f32,
    /// Touchpad fingers 0 and 1. Present only when the session runs with
    /// enhanced features and the device reports a touchpad.
    pub touch: [Option<TouchFinger>; 2],
    /// Motion sensors, same condition as `touch`.
    pub sensors: Option<SensorReading>,
    pressed: u32,
    just_pressed: u32,
}

static DISCONNECTED: Snapshot = Snapshot {
    connected: false,
    name: String::new(),
    axes: Axes {
        left_x: 0.0,
        left_y: 0.0,
        right_x: 0.0,
        right_y: 0.0,
        left_trigger: 0.0,
        right_trigger: 0.0,
    },
    left_stick_angle: 0.0,
    left_stick_magnitude: 0.0,
    right_stick_angle: 0.0,
    right_stick_magnitude: 0.0,
    touch: [None, None],
    sensors: None,
    pressed: 0,
    just_pressed: 0,
};

impl Snapshot {
    /// The shared disconnected value. All fields are defaults.
    pub fn disconnected() -> Snapshot {
        DISCONNECTED.clone()
    }

    pub(crate) fn connected(
        name: String,
        axes: Axes,
        pressed: u32,
        just_pressed: u32,
        touch: [Option<TouchFinger>; 2],
        sensors: Option<SensorReading>,
    ) -> Snapshot {
        let (left_stick_angle, left_stick_magnitude) = crate::stick::polar(axes.left_x, axes.left_y);
        let (right_stick_angle, right_stick_magnitude) =
            crate::stick::polar(axes.right_x, axes.right_y);
        Snapshot {
            connected: true,
            name,
            axes,
            left_stick_angle,
            left_stick_magnitude,
            right_stick_angle,
            right_stick_magnitude,
            touch,
            sensors,
            pressed,
            just_pressed,
        }
    }

    /// Whether the button is currently held.
    pub fn pressed(&self, button: Button) -> bool {
        self.pressed & button.bit() != 0
    }

    /// Whether the button transitioned released → held on this poll.
    /// True for at most one poll per press: the slot consumes the edge when
    /// it produces the snapshot.
    pub fn just_pressed(&self, button: Button) -> bool {
        self.just_pressed & button.bit() != 0
    }

    /// Raw held-button mask.
    pub fn pressed_mask(&self) -> u32 {
        self.pressed
    }

    /// Raw just-pressed mask.
    pub fn just_pressed_mask(&self) -> u32 {
        self.just_pressed
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_is_all_defaults() {
        let snap = Snapshot::disconnected();
        assert!(!snap.connected);
        assert!(snap.name.is_empty());
        assert_eq!(snap.axes, Axes::default());
        assert_eq!(snap.left_stick_angle, 0.0);
        assert_eq!(snap.left_stick_magnitude, 0.0);
        assert_eq!(snap.right_stick_angle, 0.0);
        assert_eq!(snap.right_stick_magnitude, 0.0);
        assert_eq!(snap.touch, [None, None]);
        assert_eq!(snap.sensors, None);
        assert_eq!(snap.pressed_mask(), 0);
        assert_eq!(snap.just_pressed_mask(), 0);
        for b in Button::ALL {
            assert!(!snap.pressed(b));
            assert!(!snap.just_pressed(b));
        }
    }

    #[test]
    fn default_is_disconnected() {
        assert_eq!(Snapshot::default(), Snapshot::disconnected());
    }

    #[test]
    fn connected_derives_polar() {
        let axes = Axes { left_x: 1.0, left_y: 0.0, right_x: 0.0, right_y: 1.0, ..Axes::default() };
        let snap = Snapshot::connected("Pad".into(), axes, 0, 0, [None, None], None);
        assert!(snap.connected);
        assert!((snap.left_stick_angle - 0.0).abs() < 1e-5);
        assert!((snap.left_stick_magnitude - 1.0).abs() < 1e-5);
        assert!((snap.right_stick_angle - 90.0).abs() < 1e-5);
        assert!((snap.right_stick_magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn button_accessors_read_masks() {
        let mask = Button::A.bit() | Button::DpadLeft.bit();
        let snap =
            Snapshot::connected("Pad".into(), Axes::default(), mask, Button::A.bit(), [None, None], None);
        assert!(snap.pressed(Button::A));
        assert!(snap.pressed(Button::DpadLeft));
        assert!(snap.just_pressed(Button::A));
        assert!(!snap.just_pressed(Button::DpadLeft));
        assert!(!snap.pressed(Button::Guide));
    }
}
