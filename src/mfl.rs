//! Steering Wheel (MFL) Button Handling
//!
//! The wheel reports raw codes, not gestures: a tap arrives as press then
//! release, a hold as press, a repeating hold code, then release. This module
//! recovers the intended gesture and maps it to a playback command.

use crate::bt::BtCommand;
use crate::codec::{cmd, BusMessage};
use tracing::{debug, warn};

/// Button identity bits of a media button code.
pub mod button {
    pub const SEARCH_UP: u8 = 0x01;
    pub const SEARCH_DOWN: u8 = 0x08;
    pub const CALL: u8 = 0x80; // R/T
}

/// Action bits of a media button code.
pub mod action {
    pub const PRESS: u8 = 0x00;
    pub const HOLD: u8 = 0x10;
    pub const RELEASE: u8 = 0x20;
}

const BUTTON_MASK: u8 = 0xCF;
const ACTION_MASK: u8 = 0x30;

/// Tap/hold/release disambiguation for the steering wheel media buttons.
///
/// The held edge is kept so that hold repeats collapse into a single command
/// and a release can be matched against the gesture that opened it. State
/// never survives a release, matched or not.
#[derive(Debug, Default)]
pub struct MflMachine {
    held: Option<(u8, u8)>,
}

impl MflMachine {
    pub fn new() -> Self {
        Self { held: None }
    }

    /// Feed one steering wheel message; returns the resolved command, if any.
    pub fn handle(&mut self, msg: &BusMessage) -> Option<BtCommand> {
        if msg.body.len() < 2 || msg.body[0] != cmd::MFL_BUTTONS {
            // Volume and other wheel traffic is not a media button code.
            return None;
        }

        let code = msg.body[1];
        let btn = code & BUTTON_MASK;

        if !matches!(btn, button::SEARCH_UP | button::SEARCH_DOWN | button::CALL) {
            debug!("unrecognized steering wheel code 0x{:02X}", code);
            self.held = None;
            return None;
        }

        match code & ACTION_MASK {
            action::PRESS => {
                self.held = Some((btn, action::PRESS));
                None
            }
            action::HOLD => self.on_hold(btn),
            action::RELEASE => self.on_release(btn),
            _ => {
                debug!("unrecognized steering wheel action 0x{:02X}", code);
                self.held = None;
                None
            }
        }
    }

    fn on_hold(&mut self, btn: u8) -> Option<BtCommand> {
        if self.held == Some((btn, action::HOLD)) {
            // Key repeat tick, the gesture already fired.
            return None;
        }
        self.held = Some((btn, action::HOLD));

        match btn {
            button::SEARCH_UP => Some(BtCommand::SeekForwardStart),
            button::SEARCH_DOWN => Some(BtCommand::SeekBackwardStart),
            button::CALL => Some(BtCommand::Play),
            _ => None,
        }
    }

    fn on_release(&mut self, btn: u8) -> Option<BtCommand> {
        let (held_btn, held_action) = self.held.take()?;

        if held_btn != btn {
            warn!(
                "steering wheel release 0x{:02X} does not match held button 0x{:02X}",
                btn, held_btn
            );
            return None;
        }

        match (held_btn, held_action) {
            (button::SEARCH_UP, action::PRESS) => Some(BtCommand::Next),
            (button::SEARCH_UP, action::HOLD) => Some(BtCommand::SeekForwardStop),
            (button::SEARCH_DOWN, action::PRESS) => Some(BtCommand::Previous),
            (button::SEARCH_DOWN, action::HOLD) => Some(BtCommand::SeekBackwardStop),
            (button::CALL, action::PRESS) => Some(BtCommand::Stop),
            // Play already fired on the hold edge; the release closes the
            // gesture without a command.
            (button::CALL, action::HOLD) => None,
            (b, a) => {
                warn!("no command mapped for released gesture (0x{:02X}, 0x{:02X})", b, a);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::addr;

    fn wheel(code: u8) -> BusMessage {
        BusMessage::new(addr::MFL, addr::RAD, vec![cmd::MFL_BUTTONS, code])
    }

    #[test]
    fn test_tap_emits_next() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        assert_eq!(mfl.handle(&wheel(0x21)), Some(BtCommand::Next));
        assert_eq!(mfl.held, None);
    }

    #[test]
    fn test_tap_emits_previous() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x08)), None);
        assert_eq!(mfl.handle(&wheel(0x28)), Some(BtCommand::Previous));
    }

    #[test]
    fn test_hold_fires_once_despite_repeats() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        assert_eq!(mfl.handle(&wheel(0x11)), Some(BtCommand::SeekForwardStart));
        // The wheel repeats the hold code on every tick while held down.
        assert_eq!(mfl.handle(&wheel(0x11)), None);
        assert_eq!(mfl.handle(&wheel(0x11)), None);
        assert_eq!(mfl.handle(&wheel(0x21)), Some(BtCommand::SeekForwardStop));
        assert_eq!(mfl.held, None);
    }

    #[test]
    fn test_hold_down_seeks_backward() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x08)), None);
        assert_eq!(mfl.handle(&wheel(0x18)), Some(BtCommand::SeekBackwardStart));
        assert_eq!(mfl.handle(&wheel(0x28)), Some(BtCommand::SeekBackwardStop));
    }

    #[test]
    fn test_mismatched_release_emits_nothing() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        // Down released while up was held: no command, state cleared.
        assert_eq!(mfl.handle(&wheel(0x28)), None);
        assert_eq!(mfl.held, None);
        // A following up release finds no gesture to close.
        assert_eq!(mfl.handle(&wheel(0x21)), None);
    }

    #[test]
    fn test_call_button_tap_stops_hold_plays() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x80)), None);
        assert_eq!(mfl.handle(&wheel(0xA0)), Some(BtCommand::Stop));

        assert_eq!(mfl.handle(&wheel(0x80)), None);
        assert_eq!(mfl.handle(&wheel(0x90)), Some(BtCommand::Play));
        assert_eq!(mfl.handle(&wheel(0xA0)), None);
        assert_eq!(mfl.held, None);
    }

    #[test]
    fn test_unknown_code_clears_held_state() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        assert_eq!(mfl.handle(&wheel(0x3F)), None);
        assert_eq!(mfl.held, None);
    }

    #[test]
    fn test_volume_traffic_ignored() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        let volume = BusMessage::new(addr::MFL, addr::RAD, vec![cmd::MFL_VOLUME, 0x11]);
        assert_eq!(mfl.handle(&volume), None);
        // Volume presses must not disturb an in-flight media gesture.
        assert_eq!(mfl.handle(&wheel(0x21)), Some(BtCommand::Next));
    }

    #[test]
    fn test_press_replaces_earlier_press() {
        let mut mfl = MflMachine::new();
        assert_eq!(mfl.handle(&wheel(0x01)), None);
        assert_eq!(mfl.handle(&wheel(0x08)), None);
        assert_eq!(mfl.handle(&wheel(0x28)), Some(BtCommand::Previous));
    }
}
