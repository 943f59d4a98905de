/// Button identity and edge detection.
///
/// Every button occupies one bit in a `u32` mask. A slot keeps the mask from
/// its previous poll; the "just pressed" set for the current poll is the set
/// of bits that are high now and were low then. Edge detection is pure —
/// the state it needs (previous/current masks) is handed in by the caller.

/// The full button surface across supported pads. Paddle buttons are the
/// Xbox Elite paddles, Misc1 is the Series X share / PS5 mute / Switch Pro
/// capture button, Touchpad is the PS4/PS5 touchpad click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    Back,
    Guide,
    Start,
    LeftStick,
    RightStick,
    LeftBumper,
    RightBumper,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Misc1,
    Paddle1,
    Paddle2,
    Paddle3,
    Paddle4,
    Touchpad,
}

impl Button {
    /// All buttons, in bit order.
    pub const ALL: [Button; 21] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Back,
        Button::Guide,
        Button::Start,
        Button::LeftStick,
        Button::RightStick,
        Button::LeftBumper,
        Button::RightBumper,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
        Button::Misc1,
        Button::Paddle1,
        Button::Paddle2,
        Button::Paddle3,
        Button::Paddle4,
        Button::Touchpad,
    ];

    /// The bit this button occupies in a button mask.
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Bits that are set in `current` but were clear in `previous`.
pub fn just_pressed(previous: u32, current: u32) -> u32 {
    current & !previous
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_distinct() {
        let mut seen = 0u32;
        for b in Button::ALL {
            assert_eq!(seen & b.bit(), 0, "{b:?} collides");
            seen |= b.bit();
        }
        assert_eq!(seen.count_ones(), Button::ALL.len() as u32);
    }

    #[test]
    fn rising_edges_only() {
        // Nothing held, then bits 0 and 2 go down → both are new presses.
        assert_eq!(just_pressed(0b0000, 0b0101), 0b0101);
    }

    #[test]
    fn held_buttons_are_not_new() {
        // Same mask on both frames → no edges, even though buttons are held.
        assert_eq!(just_pressed(0b0101, 0b0101), 0);
    }

    #[test]
    fn release_is_not_an_edge() {
        assert_eq!(just_pressed(0b0111, 0b0001), 0);
    }

    #[test]
    fn mixed_frame() {
        // Bit 0 held, bit 1 released, bit 2 newly pressed.
        assert_eq!(just_pressed(0b0011, 0b0101), 0b0100);
    }

    #[test]
    fn named_button_edge() {
        let prev = Button::A.bit();
        let cur = Button::A.bit() | Button::Touchpad.bit();
        let just = just_pressed(prev, cur);
        assert_eq!(just & Button::A.bit(), 0);
        assert_ne!(just & Button::Touchpad.bit(), 0);
    }
}
