//! Per-Tic Player Commands
//!
//! A [`TicCmd`] is the complete input of one player for one tic. It is
//! copied verbatim into the player slot at the top of the tic, and it is
//! the unit of demo recording: everything the simulation does follows
//! deterministically from the sequence of commands.

use serde::{Deserialize, Serialize};

// Button bits.

/// Fire the current weapon.
pub const BT_ATTACK: u8 = 1;
/// Operate doors and switches.
pub const BT_USE: u8 = 2;
/// Change weapon to the one in the weapon bits.
pub const BT_CHANGE: u8 = 4;
/// Weapon selection bits, meaningful with [`BT_CHANGE`].
pub const BT_WEAPON_MASK: u8 = 8 + 16 + 32;
/// Shift to extract the weapon selection.
pub const BT_WEAPON_SHIFT: u8 = 3;
/// The command is a special request, not gameplay input.
pub const BT_SPECIAL: u8 = 128;
/// Special request: toggle pause.
pub const BTS_PAUSE: u8 = 1;

/// One player's input for one tic.
///
/// The wire form is exactly [`TicCmd::SIZE`] bytes in a fixed order; the
/// turn delta keeps only its high byte on the wire, so recorded turns are
/// quantized to multiples of 256.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicCmd {
    /// Forward (+) / backward (-) thrust.
    pub forward: i8,
    /// Strafe right (+) / left (-) thrust.
    pub side: i8,
    /// Angle turn delta, applied as the high word of a binary angle.
    pub turn: i16,
    /// `BT_*` button bits.
    pub buttons: u8,
}

impl TicCmd {
    /// Bytes per command on the wire.
    pub const SIZE: usize = 4;

    /// An empty (no-op) command.
    pub const fn new() -> Self {
        Self {
            forward: 0,
            side: 0,
            turn: 0,
            buttons: 0,
        }
    }

    /// True when this command does nothing.
    pub fn is_idle(&self) -> bool {
        *self == Self::new()
    }

    /// True when the attack button is down (and the command is not special).
    #[inline]
    pub fn attack_down(&self) -> bool {
        self.buttons & BT_SPECIAL == 0 && self.buttons & BT_ATTACK != 0
    }

    /// True when the use button is down (and the command is not special).
    #[inline]
    pub fn use_down(&self) -> bool {
        self.buttons & BT_SPECIAL == 0 && self.buttons & BT_USE != 0
    }

    /// Pack into the fixed wire order: forward, side, turn high byte,
    /// buttons.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            self.forward as u8,
            self.side as u8,
            (self.turn.wrapping_add(128) >> 8) as u8,
            self.buttons,
        ]
    }

    /// Unpack from the wire order. The turn byte re-expands into the high
    /// byte of the delta.
    pub fn decode(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            forward: bytes[0] as i8,
            side: bytes[1] as i8,
            turn: ((bytes[2] as i8) as i16) << 8,
            buttons: bytes[3],
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle() {
        assert!(TicCmd::new().is_idle());
        let cmd = TicCmd {
            forward: 1,
            ..TicCmd::new()
        };
        assert!(!cmd.is_idle());
    }

    #[test]
    fn test_buttons() {
        let mut cmd = TicCmd::new();
        cmd.buttons = BT_ATTACK | BT_USE;
        assert!(cmd.attack_down());
        assert!(cmd.use_down());

        // Special commands never read as gameplay buttons
        cmd.buttons = BT_SPECIAL | BTS_PAUSE;
        assert!(!cmd.attack_down());
        assert!(!cmd.use_down());
    }

    #[test]
    fn test_encode_layout() {
        let cmd = TicCmd {
            forward: 25,
            side: -25,
            turn: 0x300,
            buttons: BT_ATTACK,
        };
        assert_eq!(cmd.encode(), [25, 231, 3, BT_ATTACK]);
    }

    #[test]
    fn test_roundtrip_quantizes_turn() {
        let cmd = TicCmd {
            forward: 50,
            side: 3,
            turn: 0x1234,
            buttons: BT_USE,
        };
        let back = TicCmd::decode(cmd.encode());
        assert_eq!(back.forward, 50);
        assert_eq!(back.side, 3);
        assert_eq!(back.buttons, BT_USE);
        // Turn keeps only its high byte (rounded)
        assert_eq!(back.turn, 0x1200);

        // Multiples of 256 survive exactly, including negatives
        for turn in [-0x4000i16, -0x100, 0, 0x100, 0x2300] {
            let cmd = TicCmd {
                turn,
                ..TicCmd::new()
            };
            assert_eq!(TicCmd::decode(cmd.encode()).turn, turn);
        }
    }
}
