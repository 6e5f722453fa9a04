//! Daemon Configuration
//!
//! Optional JSON file given as the first command line argument; every field
//! falls back to a default sized for real bus traffic.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Display scheduler geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Characters the head unit shows at once.
    pub window: usize,
    /// Characters the scroll cursor advances per refresh.
    pub scroll_step: usize,
    /// Base 1 Hz ticks between scroll refreshes.
    pub refresh_ticks: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window: 11,
            scroll_step: 2,
            refresh_ticks: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device the K-Bus transceiver is attached to.
    pub port: String,
    /// Bus baud rate; the I/K-Bus runs 9600 8E1.
    pub baud_rate: u32,
    /// Decoded-message queue depth, transport to router.
    pub inbound_depth: usize,
    /// Outbound frame queue depth, everyone to transport.
    pub outbound_depth: usize,
    /// Per-emulator inbound queue depth.
    pub emulator_depth: usize,
    /// How long a producer waits on a full queue before dropping.
    pub send_timeout_ms: u64,
    /// Period of the unsolicited CD changer ready announcement.
    pub announce_secs: u64,
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            inbound_depth: 32,
            outbound_depth: 32,
            emulator_depth: 8,
            send_timeout_ms: 250,
            announce_secs: 20,
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path))
            }
            None => Ok(Self::default()),
        }
    }
}
