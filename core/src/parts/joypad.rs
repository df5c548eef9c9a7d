//! Joypad controller.

use log::trace;
use vantage_arch::{Block, Half};

use super::pic::{Pic, Source};
use crate::api::part::joypad::Joypad as Api;

/// Joypad buttons.
///
/// Each button maps to a bit of the key-input register. Note that the
/// register is *active-low*: a zero bit means pressed.
#[must_use]
#[rustfmt::skip]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Button {
    /// Primary action button.
    A      = 0,
    /// Secondary action button.
    B      = 1,
    /// Select button.
    Select = 2,
    /// Start button.
    Start  = 3,
    /// Direction pad right.
    Right  = 4,
    /// Direction pad left.
    Left   = 5,
    /// Direction pad up.
    Up     = 6,
    /// Direction pad down.
    Down   = 7,
    /// Right shoulder button.
    R      = 8,
    /// Left shoulder button.
    L      = 9,
}

impl Button {
    /// Returns the button's bit in the key-input register.
    #[must_use]
    pub fn mask(self) -> Half {
        1 << (self as Half)
    }
}

/// Joypad controller.
///
/// | Address | Size | Name     | Description            |
/// |:-------:|------|----------|------------------------|
/// | `$0130` | Half | KEYINPUT | Key state (read-only)  |
/// | `$0132` | Half | KEYCNT   | Key interrupt control  |
#[derive(Debug)]
pub struct Joypad {
    /// Key state (active-low).
    pub keys: Half,
    /// Key interrupt control.
    pub ctrl: Half,
}

impl Joypad {
    /// Valid key bits.
    pub const MASK: Half = 0x03ff;

    /// Updates the raw key state.
    ///
    /// `state` uses the active-low register encoding: a zero bit is a held
    /// button. Raises the keypad interrupt when the held set matches the
    /// condition programmed into the control register.
    pub fn set_state(&mut self, state: Half, pic: &mut Pic) {
        self.keys = state | !Self::MASK;
        trace!("key state: {:#06x}", self.keys);

        // KEYCNT[14] enables the interrupt; KEYCNT[15] selects whether any
        // (0) or all (1) of the selected keys must be held.
        if self.ctrl & 0x4000 != 0 {
            let select = self.ctrl & Self::MASK;
            let held = !self.keys & Self::MASK;
            let matched = if self.ctrl & 0x8000 == 0 {
                held & select != 0
            } else {
                select != 0 && held & select == select
            };
            if matched {
                pic.raise(Source::Keypad);
            }
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self {
            // All buttons released.
            keys: 0xffff,
            ctrl: 0,
        }
    }
}

impl Api for Joypad {
    type Button = Button;

    fn input(&mut self, keys: &[Self::Button]) {
        let mut state = 0xffff;
        for key in keys {
            state &= !key.mask();
        }
        // Callers driving `input` directly do not provide interrupt wiring;
        // the console facade routes through `set_state` instead.
        self.keys = state;
    }
}

impl Block for Joypad {
    fn reset(&mut self) {
        std::mem::take(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_active_low() {
        let mut pad = Joypad::default();
        let mut pic = Pic::default();
        pad.set_state(!Button::A.mask(), &mut pic);
        assert_eq!(pad.keys & Button::A.mask(), 0);
        assert_ne!(pad.keys & Button::Start.mask(), 0);
    }

    #[test]
    fn keypad_interrupt_any_mode() {
        let mut pad = Joypad::default();
        let mut pic = Pic::default();
        pad.ctrl = 0x4000 | Button::Start.mask();
        pad.set_state(!Button::Start.mask(), &mut pic);
        assert_ne!(pic.req & Source::Keypad.mask(), 0);
    }

    #[test]
    fn keypad_interrupt_all_mode() {
        let mut pad = Joypad::default();
        let mut pic = Pic::default();
        pad.ctrl = 0xc000 | Button::A.mask() | Button::B.mask();
        // Only A held: no interrupt.
        pad.set_state(!Button::A.mask(), &mut pic);
        assert_eq!(pic.req & Source::Keypad.mask(), 0);
        // Both held: interrupt.
        pad.set_state(!(Button::A.mask() | Button::B.mask()), &mut pic);
        assert_ne!(pic.req & Source::Keypad.mask(), 0);
    }
}
