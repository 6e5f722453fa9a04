//! Emulated Bus Accessories
//!
//! Each emulated device is an independent response state machine with its
//! own inbound queue; replies go back out through the shared transmit queue.

use crate::codec::{addr, cmd, BusMessage};
use crate::transport;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use tracing::info;

/// A bus accessory the bridge impersonates.
pub trait Emulator {
    /// Short name used in logs and queue diagnostics.
    fn name(&self) -> &'static str;

    /// Bus address the device answers on.
    fn address(&self) -> u8;

    /// Answer one directed message with zero or more replies. Unrecognized
    /// commands produce no reply; unknown traffic is normal on a shared bus.
    fn handle(&mut self, msg: &BusMessage) -> Vec<BusMessage>;
}

/// "Device status ready" message, the universal handshake reply. The
/// after-reset variant is only sent once, when the bridge first comes up.
pub fn dev_ready(source: u8, destination: u8, after_reset: bool) -> BusMessage {
    let flag = if after_reset { 0x01 } else { 0x00 };
    BusMessage::new(source, destination, vec![cmd::DEV_STAT_RDY, flag])
}

/// Run one emulator against its inbound queue until the queue closes.
pub async fn task<E: Emulator>(
    mut emulator: E,
    mut inbound: mpsc::Receiver<BusMessage>,
    outbound: mpsc::Sender<BusMessage>,
) {
    info!("{} emulator up at 0x{:02X}", emulator.name(), emulator.address());

    while let Some(msg) = inbound.recv().await {
        for reply in emulator.handle(&msg) {
            transport::send_or_drop(emulator.name(), &outbound, reply).await;
        }
    }

    info!("{} emulator queue closed, exiting", emulator.name());
}

/// Periodic unsolicited "device status ready", so the head unit keeps
/// treating the device as alive between polls.
pub async fn announcer(address: u8, period: Duration, outbound: mpsc::Sender<BusMessage>) {
    let mut ticker = time::interval(period);
    // The immediate first tick duplicates the boot announcement; skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        transport::send_or_drop("announce", &outbound, dev_ready(address, addr::LOC, false)).await;
    }
}
