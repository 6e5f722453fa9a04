//! Vehicle Display Text Scheduler
//!
//! The head unit shows a short fixed-width text field. Track titles rarely
//! fit, so the scheduler pages a window across the composed label on a slow
//! cadence and pushes each window to the cluster through the telephone's
//! display path.

use crate::bt::NowPlaying;
use crate::codec::{addr, cmd, BusMessage};
use crate::transport;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;

/// Display strings served to the bus, refreshed by the Bluetooth layer.
///
/// Written by the now-playing consumer, read by the satellite radio
/// emulator and the scheduler tick; always accessed through the lock.
#[derive(Debug, Clone)]
pub struct DisplayText {
    pub channel: String,
    pub artist: String,
    pub song: String,
    pub esn: String,
}

impl Default for DisplayText {
    fn default() -> Self {
        Self {
            channel: "Phone - No Info".to_string(),
            artist: "No Artist Info".to_string(),
            song: "No Song Info".to_string(),
            esn: "112358132134".to_string(),
        }
    }
}

pub type SharedDisplayText = Arc<Mutex<DisplayText>>;

pub fn shared_display_text() -> SharedDisplayText {
    Arc::new(Mutex::new(DisplayText::default()))
}

/// Scroll cursor over the current label.
///
/// Labels that fit in one window are emitted as-is with no cursor movement;
/// longer labels advance by a fixed step per refresh and wrap to the start
/// once the cursor runs off the end.
#[derive(Debug)]
pub struct DisplayScheduler {
    label: Vec<char>,
    cursor: usize,
    window: usize,
    step: usize,
}

impl DisplayScheduler {
    pub fn new(window: usize, step: usize) -> Self {
        Self {
            label: DisplayText::default().channel.chars().collect(),
            cursor: 0,
            window,
            step,
        }
    }

    /// Compose a fresh label from a now-playing update and rewind the
    /// cursor. The caller is expected to emit immediately afterwards.
    pub fn set_now_playing(&mut self, update: &NowPlaying) {
        let label = if update.track_title.is_empty() {
            if update.playback_state.is_empty() {
                DisplayText::default().channel
            } else {
                update.playback_state.clone()
            }
        } else if update.artist_name.is_empty() {
            update.track_title.clone()
        } else {
            format!("{} - {}", update.track_title, update.artist_name)
        };

        self.label = label.chars().collect();
        self.cursor = 0;
    }

    /// Emit the current window and advance the scroll cursor.
    pub fn refresh(&mut self) -> BusMessage {
        let text = self.window_text();

        if self.label.len() > self.window {
            self.cursor += self.step;
            if self.cursor >= self.label.len() {
                self.cursor = 0;
            }
        }

        display_message(&text)
    }

    fn window_text(&self) -> String {
        if self.label.len() <= self.window {
            return self.label.iter().collect();
        }

        let end = (self.cursor + self.window).min(self.label.len());
        let mut text: String = self.label[self.cursor..end].iter().collect();
        // Fixed-width field: pad the wrap-around tail with spaces.
        while text.chars().count() < self.window {
            text.push(' ');
        }
        text
    }
}

/// Cluster text update pushed from the telephone's display path.
fn display_message(text: &str) -> BusMessage {
    let mut body = vec![cmd::UPDATE_MID, 0x42, 0x32];
    // The cluster speaks a latin charset; anything else becomes '?'.
    body.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
    BusMessage::new(addr::TEL, addr::IKE, body)
}

/// Scheduler task: a 1 Hz base tick, gated down to one refresh every
/// `refresh_ticks`; a new label short-circuits the gate and shows at once.
pub async fn run(
    mut scheduler: DisplayScheduler,
    refresh_ticks: u32,
    mut labels: mpsc::Receiver<NowPlaying>,
    outbound: mpsc::Sender<BusMessage>,
) {
    let mut ticker = interval(Duration::from_secs(1));
    let mut ticks = 0u32;

    info!("display scheduler up");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                if ticks >= refresh_ticks {
                    ticks = 0;
                    let msg = scheduler.refresh();
                    transport::send_or_drop("display", &outbound, msg).await;
                }
            }
            update = labels.recv() => {
                match update {
                    Some(update) => {
                        scheduler.set_now_playing(&update);
                        ticks = 0;
                        let msg = scheduler.refresh();
                        transport::send_or_drop("display", &outbound, msg).await;
                    }
                    None => break,
                }
            }
        }
    }
    info!("label channel closed, display scheduler exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(title: &str, artist: &str) -> NowPlaying {
        NowPlaying {
            track_title: title.to_string(),
            artist_name: artist.to_string(),
            album_name: String::new(),
            playback_state: "Playing".to_string(),
        }
    }

    fn window_of(msg: &BusMessage) -> String {
        msg.body[3..].iter().map(|&b| b as char).collect()
    }

    #[test]
    fn test_short_label_is_static() {
        let mut scheduler = DisplayScheduler::new(11, 2);
        scheduler.set_now_playing(&playing("Short", ""));

        let first = scheduler.refresh();
        let second = scheduler.refresh();
        assert_eq!(window_of(&first), "Short");
        assert_eq!(first, second);
        assert_eq!(scheduler.cursor, 0);
    }

    #[test]
    fn test_long_label_scrolls_and_wraps() {
        let mut scheduler = DisplayScheduler::new(11, 2);
        // 20 characters, step 2: the opening window must come around again
        // after ceil(20 / 2) = 10 refreshes.
        scheduler.set_now_playing(&playing("ABCDEFGHIJKLMNOPQRST", ""));

        let first = window_of(&scheduler.refresh());
        assert_eq!(first, "ABCDEFGHIJK");

        for _ in 0..9 {
            assert_ne!(window_of(&scheduler.refresh()), first);
        }
        assert_eq!(window_of(&scheduler.refresh()), first);
    }

    #[test]
    fn test_wrap_tail_is_padded_to_window_width() {
        let mut scheduler = DisplayScheduler::new(11, 2);
        scheduler.set_now_playing(&playing("ABCDEFGHIJKLM", ""));

        // Walk the cursor near the end of the 13-char label.
        for _ in 0..6 {
            scheduler.refresh();
        }
        let tail = window_of(&scheduler.refresh());
        assert_eq!(tail.len(), 11);
        assert!(tail.starts_with("M"));
        assert!(tail.ends_with("          "));
    }

    #[test]
    fn test_new_label_resets_cursor() {
        let mut scheduler = DisplayScheduler::new(11, 2);
        scheduler.set_now_playing(&playing("A very long track title indeed", "Someone"));
        scheduler.refresh();
        scheduler.refresh();
        assert_ne!(scheduler.cursor, 0);

        scheduler.set_now_playing(&playing("Next Song Title Goes Here", "Band"));
        assert_eq!(scheduler.cursor, 0);
        assert!(window_of(&scheduler.refresh()).starts_with("Next Song"));
    }

    #[test]
    fn test_label_composition() {
        let mut scheduler = DisplayScheduler::new(11, 2);

        scheduler.set_now_playing(&playing("Title", "Artist"));
        assert_eq!(scheduler.label.iter().collect::<String>(), "Title - Artist");

        // No track metadata: fall back to the playback state label.
        let paused = NowPlaying {
            playback_state: "Paused".to_string(),
            ..Default::default()
        };
        scheduler.set_now_playing(&paused);
        assert_eq!(scheduler.label.iter().collect::<String>(), "Paused");
    }

    #[test]
    fn test_display_message_shape() {
        let mut scheduler = DisplayScheduler::new(11, 2);
        scheduler.set_now_playing(&playing("Tout était bien", ""));
        let msg = scheduler.refresh();

        assert_eq!(msg.source, addr::TEL);
        assert_eq!(msg.destination, addr::IKE);
        assert_eq!(&msg.body[..3], &[cmd::UPDATE_MID, 0x42, 0x32]);
        // Accented characters are transliterated before hitting the wire.
        assert_eq!(window_of(&msg), "Tout ?tait ");
    }
}
