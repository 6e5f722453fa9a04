//! CD Changer Emulation
//!
//! Read-only emulation: the changer answers the head unit's polls and
//! control requests with a fixed magazine status, there is no real media
//! behind it. The actual audio comes in over the radio's aux path.

use crate::codec::{addr, cmd, BusMessage};
use crate::emulator::{dev_ready, Emulator};
use tracing::debug;

/// Fixed status block: six discs loaded, disc 1 track 1, stopped.
const STATUS_REPLY: [u8; 8] = [cmd::CD_STAT_RPLY, 0x00, 0x02, 0x00, 0x3F, 0x00, 0x01, 0x01];

#[derive(Debug, Default)]
pub struct CdChanger;

impl Emulator for CdChanger {
    fn name(&self) -> &'static str {
        "cdc"
    }

    fn address(&self) -> u8 {
        addr::CDC
    }

    fn handle(&mut self, msg: &BusMessage) -> Vec<BusMessage> {
        let Some(&command) = msg.body.first() else {
            return Vec::new();
        };

        match command {
            cmd::DEV_STAT_REQ => {
                debug!("cdc: status request from 0x{:02X}", msg.source);
                vec![dev_ready(addr::CDC, msg.source, false)]
            }
            cmd::CD_CTRL_REQ => {
                debug!("cdc: control request {:02X?}", &msg.body[1..]);
                vec![BusMessage::new(addr::CDC, msg.source, STATUS_REPLY.to_vec())]
            }
            other => {
                debug!("cdc: unhandled command 0x{:02X}", other);
                Vec::new()
            }
        }
    }
}
