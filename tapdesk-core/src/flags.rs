//! Pointer event flags as understood by the remote protocol.
//!
//! These are the `PTRFLAGS_*` values of the RDP slow-path/fast-path pointer
//! PDU. A button event carries the button bit plus `DOWN` for a press, the
//! button bit alone for a release.

use bitflags::bitflags;

bitflags! {
    /// Flags passed with every pointer command.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PointerFlags: u16 {
        /// Negative wheel rotation.
        const WHEEL_NEGATIVE = 0x0100;
        /// Vertical wheel event; low byte holds the rotation.
        const WHEEL = 0x0200;
        /// Pointer moved.
        const MOVE = 0x0800;
        /// Left button.
        const BUTTON1 = 0x1000;
        /// Right button.
        const BUTTON2 = 0x2000;
        /// Middle button.
        const BUTTON3 = 0x4000;
        /// Button pressed (absent = released).
        const DOWN = 0x8000;

        const _ = !0;
    }
}

/// Wheel rotation units for one notch up.
pub const WHEEL_ROTATION_UP: u16 = 0x0078;
/// Wheel rotation units for one notch down (two's complement low byte).
pub const WHEEL_ROTATION_DOWN: u16 = 0x0088;

impl PointerFlags {
    /// One wheel notch upward.
    pub fn wheel_up() -> Self {
        Self::WHEEL | Self::from_bits_retain(WHEEL_ROTATION_UP)
    }

    /// One wheel notch downward.
    pub fn wheel_down() -> Self {
        Self::WHEEL | Self::WHEEL_NEGATIVE | Self::from_bits_retain(WHEEL_ROTATION_DOWN)
    }

    /// The wheel rotation carried in the low byte, if any.
    pub fn rotation(self) -> u8 {
        (self.bits() & 0x00FF) as u8
    }
}
