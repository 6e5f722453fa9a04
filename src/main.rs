//! K-Bus Media Bridge Daemon
//!
//! Presents a phone's Bluetooth audio source to the vehicle as native bus
//! accessories: a CD changer, a satellite radio and a telephone. Steering
//! wheel buttons become playback commands, track metadata becomes cluster
//! display text.

mod bt;
mod cdc;
mod codec;
mod config;
mod display;
mod emulator;
mod mfl;
mod router;
mod sdrs;
mod telephone;
mod transport;

use crate::cdc::CdChanger;
use crate::codec::addr;
use crate::config::Config;
use crate::display::DisplayScheduler;
use crate::router::Router;
use crate::sdrs::SatRadio;
use crate::telephone::Telephone;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    println!("╔═══════════════════════════════════════════════════════╗");
    println!("║     K-Bus Media Bridge v1.0                           ║");
    println!("║     CD Changer / Satellite Radio / Telephone          ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    info!("using bus port {}", config.port);

    // Everything downstream of the transport communicates over bounded
    // queues; nothing shares mutable state except the display text buffer.
    let (bus_in_tx, bus_in_rx) = mpsc::channel(config.inbound_depth);
    let (bus_out_tx, bus_out_rx) = mpsc::channel(config.outbound_depth);
    let (cdc_tx, cdc_rx) = mpsc::channel(config.emulator_depth);
    let (sdrs_tx, sdrs_rx) = mpsc::channel(config.emulator_depth);
    let (tel_tx, tel_rx) = mpsc::channel(config.emulator_depth);
    let (bt_cmd_tx, bt_cmd_rx) = mpsc::channel(8);
    let (bt_info_tx, bt_info_rx) = mpsc::channel(4);
    let (label_tx, label_rx) = mpsc::channel(4);

    let display_text = display::shared_display_text();

    transport::spawn_pumps(&config, bus_in_tx, bus_out_rx)?;

    // Announce the emulated devices before the head unit starts polling.
    for device in [addr::CDC, addr::SDRS, addr::TEL] {
        bus_out_tx
            .send(emulator::dev_ready(device, addr::LOC, true))
            .await?;
    }

    tokio::spawn(emulator::task(CdChanger, cdc_rx, bus_out_tx.clone()));
    tokio::spawn(emulator::task(
        SatRadio::new(display_text.clone()),
        sdrs_rx,
        bus_out_tx.clone(),
    ));
    tokio::spawn(emulator::task(Telephone, tel_rx, bus_out_tx.clone()));
    tokio::spawn(emulator::announcer(
        addr::CDC,
        Duration::from_secs(config.announce_secs),
        bus_out_tx.clone(),
    ));

    let scheduler = DisplayScheduler::new(config.display.window, config.display.scroll_step);
    tokio::spawn(display::run(
        scheduler,
        config.display.refresh_ticks,
        label_rx,
        bus_out_tx.clone(),
    ));

    tokio::spawn(bt::info_consumer(
        bt_info_rx,
        display_text.clone(),
        label_tx,
    ));
    tokio::spawn(bt::command_drain(bt_cmd_rx));

    let router = Router::new(cdc_tx, sdrs_tx, tel_tx, bt_cmd_tx);
    tokio::spawn(router.run(bus_in_rx));

    info!(
        "bridge up, emulating CDC 0x{:02X}, SDRS 0x{:02X}, TEL 0x{:02X}",
        addr::CDC,
        addr::SDRS,
        addr::TEL
    );

    // The Bluetooth layer writes now-playing updates into this handle; keep
    // it alive so the consumer keeps running even when built standalone.
    let _bt_info = bt_info_tx;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
