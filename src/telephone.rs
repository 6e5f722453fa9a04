//! Telephone Emulation
//!
//! Minimal presence: the telephone answers the status handshake so the
//! vehicle believes one is installed, which unlocks the cluster display
//! path the text scheduler pushes through.

use crate::codec::{addr, cmd, BusMessage};
use crate::emulator::{dev_ready, Emulator};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Telephone;

impl Emulator for Telephone {
    fn name(&self) -> &'static str {
        "tel"
    }

    fn address(&self) -> u8 {
        addr::TEL
    }

    fn handle(&mut self, msg: &BusMessage) -> Vec<BusMessage> {
        match msg.body.first() {
            Some(&cmd::DEV_STAT_REQ) => {
                debug!("tel: status request from 0x{:02X}", msg.source);
                vec![dev_ready(addr::TEL, msg.source, false)]
            }
            Some(&other) => {
                debug!("tel: unhandled command 0x{:02X}", other);
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_handshake() {
        let mut tel = Telephone;
        let query = BusMessage::new(addr::IKE, addr::TEL, vec![cmd::DEV_STAT_REQ]);
        let replies = tel.handle(&query);

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].source, addr::TEL);
        assert_eq!(replies[0].destination, addr::IKE);
        assert_eq!(replies[0].body, vec![cmd::DEV_STAT_RDY, 0x00]);
    }

    #[test]
    fn test_everything_else_is_quiet() {
        let mut tel = Telephone;
        let led = BusMessage::new(addr::RAD, addr::TEL, vec![0x2B, 0x00]);
        assert!(tel.handle(&led).is_empty());
    }
}
