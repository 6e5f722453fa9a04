//! Satellite Radio (SDRS) Emulation
//!
//! The head unit drives a satellite tuner through a single control command
//! with a sub-command byte; the tuner answers with status and text blocks.
//! The mapping below was reconstructed from observed traffic, so it stays
//! contained in this module where a corrected capture can fix it.

use crate::codec::{addr, cmd, BusMessage};
use crate::display::SharedDisplayText;
use crate::emulator::{dev_ready, Emulator};
use tracing::{debug, info};

/// Request sub-commands, `body[1]` of a control request.
mod sub {
    pub const POWER: u8 = 0x00;
    pub const SLEEP: u8 = 0x01;
    pub const NOW: u8 = 0x02;
    pub const CHAN_UP: u8 = 0x03;
    pub const CHAN_DOWN: u8 = 0x04;
    pub const PRESET: u8 = 0x08;
    pub const ARTIST: u8 = 0x0E;
    pub const SONG: u8 = 0x0F;
    pub const ESN: u8 = 0x14;
    pub const BANK_UP: u8 = 0x15;
}

/// Reply mode byte, `body[1]` of a status reply.
mod mode {
    pub const POWER: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const STATUS: u8 = 0x02;
    pub const CHAN_DOWN_ACK: u8 = 0x03;
}

/// Satellite tuner state: current channel plus the preset bank/number pair
/// the head unit believes is selected.
pub struct SatRadio {
    channel: u8,
    bank: u8,
    preset: u8,
    display: SharedDisplayText,
}

impl SatRadio {
    pub fn new(display: SharedDisplayText) -> Self {
        Self {
            channel: 0xAF,
            bank: 0x00,
            preset: 0x00,
            display,
        }
    }

    /// Bank and preset share one byte, a nibble each.
    fn bank_preset(&self) -> u8 {
        (self.bank << 4) | (self.preset & 0x0F)
    }

    fn status_reply(&self, destination: u8, mode: u8) -> BusMessage {
        BusMessage::new(
            addr::SDRS,
            destination,
            vec![
                cmd::SDRS_STAT_RPLY,
                mode,
                0x00,
                self.channel,
                self.bank_preset(),
                0x04,
            ],
        )
    }

    /// Text reply carrying the current channel name.
    fn channel_text(&self, destination: u8) -> BusMessage {
        let text = self.display.lock().unwrap_or_else(|e| e.into_inner()).channel.clone();
        self.text_reply(destination, 0x00, self.channel, self.bank_preset(), 0x04, &text)
    }

    fn text_reply(
        &self,
        destination: u8,
        flags: u8,
        channel: u8,
        presets: u8,
        trailer: u8,
        text: &str,
    ) -> BusMessage {
        let mut body = vec![cmd::SDRS_STAT_RPLY, mode::TEXT, flags, channel, presets, trailer];
        body.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
        BusMessage::new(addr::SDRS, destination, body)
    }

    fn control(&mut self, msg: &BusMessage) -> Vec<BusMessage> {
        let Some(&request) = msg.body.get(1) else {
            return Vec::new();
        };
        let src = msg.source;

        match request {
            sub::POWER => {
                info!("sdrs: power/mode command");
                Vec::new()
            }
            sub::SLEEP => vec![self.status_reply(src, mode::POWER)],
            sub::NOW => vec![self.status_reply(src, mode::STATUS), self.channel_text(src)],
            sub::CHAN_UP => {
                self.channel = self.channel.wrapping_add(1);
                vec![self.status_reply(src, mode::STATUS), self.channel_text(src)]
            }
            sub::CHAN_DOWN => {
                self.channel = self.channel.wrapping_sub(1);
                vec![
                    self.status_reply(src, mode::CHAN_DOWN_ACK),
                    self.channel_text(src),
                ]
            }
            sub::PRESET => {
                // Whatever preset the head unit asked for is the one we have.
                if let Some(&preset) = msg.body.get(2) {
                    self.preset = preset;
                }
                vec![self.status_reply(src, mode::STATUS), self.channel_text(src)]
            }
            sub::BANK_UP => {
                self.bank = (self.bank + 1) & 0x0F;
                vec![self.status_reply(src, mode::STATUS), self.channel_text(src)]
            }
            sub::ESN => {
                let esn = self.display.lock().unwrap_or_else(|e| e.into_inner()).esn.clone();
                vec![self.text_reply(src, 0x0C, 0x30, 0x30, 0x30, &esn)]
            }
            sub::ARTIST => {
                let artist = self.display.lock().unwrap_or_else(|e| e.into_inner()).artist.clone();
                vec![self.text_reply(src, 0x06, self.channel, 0x01, 0x01, &artist)]
            }
            sub::SONG => {
                let song = self.display.lock().unwrap_or_else(|e| e.into_inner()).song.clone();
                vec![self.text_reply(src, 0x07, self.channel, 0x01, 0x01, &song)]
            }
            other => {
                debug!("sdrs: unhandled sub-command 0x{:02X}", other);
                Vec::new()
            }
        }
    }
}

impl Emulator for SatRadio {
    fn name(&self) -> &'static str {
        "sdrs"
    }

    fn address(&self) -> u8 {
        addr::SDRS
    }

    fn handle(&mut self, msg: &BusMessage) -> Vec<BusMessage> {
        let Some(&command) = msg.body.first() else {
            return Vec::new();
        };

        match command {
            cmd::DEV_STAT_REQ => {
                debug!("sdrs: status request from 0x{:02X}", msg.source);
                vec![dev_ready(addr::SDRS, msg.source, false)]
            }
            cmd::SDRS_CTRL_REQ => self.control(msg),
            other => {
                debug!("sdrs: unhandled command 0x{:02X}", other);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::shared_display_text;

    fn radio() -> SatRadio {
        SatRadio::new(shared_display_text())
    }

    fn control(request: &[u8]) -> BusMessage {
        let mut body = vec![cmd::SDRS_CTRL_REQ];
        body.extend_from_slice(request);
        BusMessage::new(addr::RAD, addr::SDRS, body)
    }

    #[test]
    fn test_channel_up_increments_and_reports() {
        let mut sdrs = radio();
        let replies = sdrs.handle(&control(&[sub::CHAN_UP, 0x00]));

        assert_eq!(sdrs.channel, 0xB0);
        assert_eq!(replies.len(), 2);
        // Status first, carrying the new channel.
        assert_eq!(replies[0].body[1], mode::STATUS);
        assert_eq!(replies[0].body[3], 0xB0);
        // Then the channel name text block.
        assert_eq!(replies[1].body[1], mode::TEXT);
        assert_eq!(replies[1].body[3], 0xB0);
    }

    #[test]
    fn test_channel_down_acknowledges() {
        let mut sdrs = radio();
        let replies = sdrs.handle(&control(&[sub::CHAN_DOWN, 0x00]));

        assert_eq!(sdrs.channel, 0xAE);
        assert_eq!(replies[0].body[1], mode::CHAN_DOWN_ACK);
        assert_eq!(replies[0].body[3], 0xAE);
    }

    #[test]
    fn test_preset_recall_leaves_bank_alone() {
        let mut sdrs = radio();
        sdrs.bank = 0x02;

        let replies = sdrs.handle(&control(&[sub::PRESET, 0x05]));
        assert_eq!(sdrs.preset, 0x05);
        assert_eq!(sdrs.bank, 0x02);
        // Packed bank/preset byte: bank high nibble, preset low nibble.
        assert_eq!(replies[0].body[4], 0x25);
    }

    #[test]
    fn test_bank_up_wraps_nibble() {
        let mut sdrs = radio();
        sdrs.bank = 0x0F;
        sdrs.handle(&control(&[sub::BANK_UP, 0x00]));
        assert_eq!(sdrs.bank, 0x00);
    }

    #[test]
    fn test_text_queries_serve_latest_metadata() {
        let display = shared_display_text();
        {
            let mut text = display.lock().unwrap();
            text.artist = "The Artist".to_string();
            text.song = "The Song".to_string();
        }
        let mut sdrs = SatRadio::new(display);

        let artist = sdrs.handle(&control(&[sub::ARTIST, 0x00]));
        assert_eq!(&artist[0].body[6..], b"The Artist");
        assert_eq!(artist[0].body[2], 0x06);

        let song = sdrs.handle(&control(&[sub::SONG, 0x00]));
        assert_eq!(&song[0].body[6..], b"The Song");
        assert_eq!(song[0].body[2], 0x07);
    }

    #[test]
    fn test_esn_block() {
        let mut sdrs = radio();
        let replies = sdrs.handle(&control(&[sub::ESN, 0x00]));

        assert_eq!(replies.len(), 1);
        assert_eq!(&replies[0].body[..6], &[0x3E, 0x01, 0x0C, 0x30, 0x30, 0x30]);
        assert_eq!(&replies[0].body[6..], b"112358132134");
    }

    #[test]
    fn test_sleep_reports_power_mode() {
        let mut sdrs = radio();
        let replies = sdrs.handle(&control(&[sub::SLEEP, 0x00]));

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body[1], mode::POWER);
        assert_eq!(replies[0].body[3], 0xAF);
    }

    #[test]
    fn test_status_handshake() {
        let mut sdrs = radio();
        let query = BusMessage::new(addr::RAD, addr::SDRS, vec![cmd::DEV_STAT_REQ]);
        let replies = sdrs.handle(&query);
        assert_eq!(replies[0].body, vec![cmd::DEV_STAT_RDY, 0x00]);
        assert_eq!(replies[0].destination, addr::RAD);
    }

    #[test]
    fn test_unknown_sub_command_is_quiet() {
        let mut sdrs = radio();
        assert!(sdrs.handle(&control(&[0x7A, 0x00])).is_empty());
        assert!(sdrs.handle(&control(&[])).is_empty());
    }
}
