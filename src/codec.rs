//! K-Bus Message Framing
//!
//! Implements message building and parsing for the vehicle's low-speed
//! accessory bus. Every frame on the wire is
//! `[src][len][dst][body...][checksum]` where `len` counts the destination,
//! body and checksum bytes and the checksum is the XOR of everything before
//! it.

use thiserror::Error;
use tracing::debug;

/// Maximum body length a single frame can carry.
///
/// The length byte is capped at 0xFF and counts destination + body +
/// checksum, leaving 253 bytes for the body itself.
pub const MAX_BODY_LEN: usize = 253;

/// One decoded bus message.
///
/// Built by the codec on receive or by an emulator on send, then handed off
/// wholesale between stages; nothing holds a message after passing it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub source: u8,
    pub destination: u8,
    pub body: Vec<u8>,
}

/// Frame decode failure. The offending bytes are discarded, never repaired.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("declared length 0x{0:02X} cannot hold destination and checksum")]
    InvalidLength(u8),

    #[error("checksum mismatch: frame carries 0x{received:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { received: u8, computed: u8 },
}

impl BusMessage {
    /// Create a new bus message.
    ///
    /// Bodies longer than [`MAX_BODY_LEN`] cannot be framed and are
    /// truncated with a warning.
    pub fn new(source: u8, destination: u8, mut body: Vec<u8>) -> Self {
        if body.len() > MAX_BODY_LEN {
            debug!(
                "WARNING: body length {} exceeds frame limit ({}), truncating",
                body.len(),
                MAX_BODY_LEN
            );
            body.truncate(MAX_BODY_LEN);
        }
        Self {
            source,
            destination,
            body,
        }
    }

    /// XOR of source, length and destination bytes plus every body byte.
    pub fn checksum(&self) -> u8 {
        let mut checksum = self.source ^ (self.body.len() as u8 + 2) ^ self.destination;
        for byte in &self.body {
            checksum ^= byte;
        }
        checksum
    }

    /// Serialize to wire format: SRC LEN DST BODY... CHK.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.body.len() + 4);
        bytes.push(self.source);
        bytes.push(self.body.len() as u8 + 2);
        bytes.push(self.destination);
        bytes.extend_from_slice(&self.body);
        bytes.push(self.checksum());
        bytes
    }

    /// Parse one complete frame from raw bytes.
    ///
    /// Trailing bytes beyond the declared length are ignored; the frame
    /// assembler hands over exactly-delimited slices.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < 2 {
            return Err(FrameError::Truncated {
                needed: 2,
                got: data.len(),
            });
        }

        let declared = data[1] as usize;
        if declared < 2 {
            return Err(FrameError::InvalidLength(data[1]));
        }

        let total = declared + 2;
        if data.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                got: data.len(),
            });
        }

        let message = Self {
            source: data[0],
            destination: data[2],
            body: data[3..total - 1].to_vec(),
        };

        let received = data[total - 1];
        let computed = message.checksum();
        if received != computed {
            return Err(FrameError::ChecksumMismatch { received, computed });
        }

        Ok(message)
    }
}

/// Bus device addresses.
///
/// The accessory bus is multi-drop; every participant has a fixed one-byte
/// address. Only a handful are relevant to the bridge but the known set is
/// kept for log readability.
#[allow(dead_code)]
pub mod addr {
    pub const GM: u8 = 0x00; // Body module
    pub const CDC: u8 = 0x18; // CD changer
    pub const GT: u8 = 0x3B; // Graphics driver (navigation)
    pub const MFL: u8 = 0x50; // Multi-function steering wheel
    pub const IHK: u8 = 0x5B; // Heating and air conditioning
    pub const RAD: u8 = 0x68; // Radio head unit
    pub const DSP: u8 = 0x6A; // DSP audio amplifier
    pub const SDRS: u8 = 0x73; // Satellite radio
    pub const IKE: u8 = 0x80; // Instrument cluster
    pub const GLO: u8 = 0xBF; // Global broadcast
    pub const MID: u8 = 0xC0; // Multi-info display
    pub const TEL: u8 = 0xC8; // Telephone
    pub const LCM: u8 = 0xD0; // Light control module
    pub const LOC: u8 = 0xFF; // Local broadcast ("to no one")
}

/// Command bytes carried in `body[0]`.
#[allow(dead_code)]
pub mod cmd {
    pub const DEV_STAT_REQ: u8 = 0x01; // Device status request
    pub const DEV_STAT_RDY: u8 = 0x02; // Device status ready
    pub const BUS_STAT_REQ: u8 = 0x03; // Bus status request
    pub const BUS_STAT_RPLY: u8 = 0x04; // Bus status
    pub const IGN_STAT_REQ: u8 = 0x10; // Ignition status request
    pub const IGN_STAT_RPLY: u8 = 0x11; // Ignition status
    pub const IKE_TXT_GONG: u8 = 0x1A; // IKE text display / gong
    pub const UPDATE_MID: u8 = 0x23; // Display text update
    pub const TEL_STATUS: u8 = 0x2C; // Telephone status
    pub const MFL_VOLUME: u8 = 0x32; // Steering wheel volume buttons
    pub const CD_CTRL_REQ: u8 = 0x38; // CD control request
    pub const CD_STAT_RPLY: u8 = 0x39; // CD status reply
    pub const MFL_BUTTONS: u8 = 0x3B; // Steering wheel media buttons
    pub const SDRS_CTRL_REQ: u8 = 0x3D; // Satellite radio control request
    pub const SDRS_STAT_RPLY: u8 = 0x3E; // Satellite radio status reply
}
