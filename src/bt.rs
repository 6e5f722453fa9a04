//! Bluetooth Control Boundary
//!
//! The bridge core never calls into the Bluetooth stack directly. It emits
//! semantic commands on an outbound channel and receives "now playing"
//! updates on an inbound one; the AVRCP control layer sits on the other end
//! of both.

use crate::display::SharedDisplayText;
use crate::transport;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Semantic playback command for the Bluetooth control layer.
// Allow unused variants: this is the full boundary vocabulary, not all of it
// is produced by the bus side.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtCommand {
    Connect,
    Disconnect,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SeekForwardStart,
    SeekForwardStop,
    SeekBackwardStart,
    SeekBackwardStop,
}

/// Track metadata pushed by the Bluetooth layer whenever the source changes
/// what it is playing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track_title: String,
    pub artist_name: String,
    pub album_name: String,
    pub playback_state: String,
}

/// Consume "now playing" updates: refresh the shared display text that the
/// satellite radio emulator serves from, then hand the update to the display
/// scheduler so the cluster text changes immediately.
pub async fn info_consumer(
    mut info: mpsc::Receiver<NowPlaying>,
    display: SharedDisplayText,
    scheduler: mpsc::Sender<NowPlaying>,
) {
    while let Some(update) = info.recv().await {
        debug!(
            "now playing: {} / {} [{}]",
            update.track_title, update.artist_name, update.playback_state
        );

        {
            let mut text = display.lock().unwrap_or_else(|e| e.into_inner());
            text.song = update.track_title.clone();
            text.artist = update.artist_name.clone();
            text.channel = if update.track_title.is_empty() {
                update.playback_state.clone()
            } else {
                format!("{} - {}", update.track_title, update.artist_name)
            };
        }

        transport::send_or_drop("display label", &scheduler, update).await;
    }
    info!("now-playing channel closed");
}

/// Stand-in consumer for the outbound command channel. The AVRCP control
/// layer attaches here; running standalone the daemon just logs what it
/// would have sent.
pub async fn command_drain(mut commands: mpsc::Receiver<BtCommand>) {
    while let Some(command) = commands.recv().await {
        info!("bluetooth command: {:?}", command);
    }
}
