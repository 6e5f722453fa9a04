//! K-Bus UART Transport
//!
//! Owns the serial port and runs the two byte pumps. The bus is half duplex:
//! the receive pump turns the raw byte stream into delimited frames for the
//! codec, the transmit pump writes one encoded frame at a time and waits for
//! transmission to finish before taking the next.

use crate::codec::{BusMessage, FrameError};
use crate::config::Config;
use anyhow::{Context, Result};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, info, warn};

/// Serial read timeout; doubles as the receive pump's poll interval so stale
/// partial frames get flushed even on a quiet bus.
const READ_POLL: Duration = Duration::from_millis(50);

/// A partial frame older than this is line noise, not a slow sender.
/// At 9600 baud a full 257-byte frame takes well under this.
const STALE_FRAME: Duration = Duration::from_millis(500);

/// Bounded wait before a producer gives up on a full queue.
pub const QUEUE_WAIT: Duration = Duration::from_millis(250);

/// Send with a bounded wait; a full queue drops the value with a warning
/// rather than stalling or crashing the producer.
pub async fn send_or_drop<T: std::fmt::Debug>(label: &str, queue: &mpsc::Sender<T>, value: T) {
    match queue.send_timeout(value, QUEUE_WAIT).await {
        Ok(()) => {}
        Err(SendTimeoutError::Timeout(value)) => {
            warn!("{} queue full, dropping {:?}", label, value);
        }
        Err(SendTimeoutError::Closed(_)) => {
            debug!("{} queue closed", label);
        }
    }
}

/// Accumulates raw bus bytes and carves them into whole frames.
///
/// Framing is length-prefixed with no sync byte, so after an invalid frame
/// the only safe recovery on this bus is to flush everything buffered and
/// start clean from the next quiet period.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take the next complete frame out of the buffer, if one has arrived.
    ///
    /// Returns `None` while the buffer holds only a partial frame. An
    /// undecodable frame flushes the buffer and surfaces the error once.
    pub fn next_message(&mut self) -> Option<Result<BusMessage, FrameError>> {
        if self.buf.len() < 2 {
            return None;
        }

        let declared = self.buf[1] as usize;
        if declared < 2 {
            self.buf.clear();
            return Some(Err(FrameError::InvalidLength(declared as u8)));
        }

        let total = declared + 2;
        if self.buf.len() < total {
            return None;
        }

        let frame: Vec<u8> = self.buf.drain(..total).collect();
        match BusMessage::from_bytes(&frame) {
            Ok(msg) => Some(Ok(msg)),
            Err(e) => {
                self.buf.clear();
                Some(Err(e))
            }
        }
    }
}

/// Open the bus UART: 9600 baud, 8 data bits, even parity, 1 stop bit.
pub fn open_port(config: &Config) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_POLL)
        .open()
        .with_context(|| format!("failed to open K-Bus port {}", config.port))?;

    info!(
        "K-Bus UART open on {} ({} baud, 8E1)",
        config.port, config.baud_rate
    );
    Ok(port)
}

/// Spawn the receive and transmit pumps on dedicated threads.
///
/// Serial I/O is blocking, so the pumps run outside the async runtime and
/// bridge into it through the bounded queues.
pub fn spawn_pumps(
    config: &Config,
    inbound: mpsc::Sender<BusMessage>,
    outbound: mpsc::Receiver<BusMessage>,
) -> Result<()> {
    let tx_port = open_port(config)?;
    let rx_port = tx_port
        .try_clone()
        .context("failed to clone serial handle for the receive pump")?;
    let send_timeout = Duration::from_millis(config.send_timeout_ms);

    thread::Builder::new()
        .name("kbus-rx".to_string())
        .spawn(move || rx_pump(rx_port, inbound, send_timeout))
        .context("failed to spawn receive pump")?;

    thread::Builder::new()
        .name("kbus-tx".to_string())
        .spawn(move || tx_pump(tx_port, outbound))
        .context("failed to spawn transmit pump")?;

    Ok(())
}

fn rx_pump(mut port: Box<dyn SerialPort>, inbound: mpsc::Sender<BusMessage>, timeout: Duration) {
    let mut assembler = FrameAssembler::new();
    let mut scratch = [0u8; 256];
    let mut last_progress = Instant::now();

    loop {
        match port.read(&mut scratch) {
            Ok(0) => {}
            Ok(n) => {
                last_progress = Instant::now();
                assembler.extend(&scratch[..n]);

                while let Some(result) = assembler.next_message() {
                    match result {
                        Ok(msg) => {
                            debug!(
                                "KBUS 0x{:02X} --> 0x{:02X} {:02X?}",
                                msg.source, msg.destination, msg.body
                            );
                            if !blocking_send(&inbound, msg, timeout) && inbound.is_closed() {
                                info!("inbound queue closed, receive pump exiting");
                                return;
                            }
                        }
                        Err(e) => warn!("invalid frame received: {}", e),
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if !assembler.is_empty() && last_progress.elapsed() > STALE_FRAME {
                    debug!("flushing {} stale buffered bytes", assembler.len());
                    assembler.clear();
                }
            }
            Err(e) => {
                warn!("K-Bus read error: {}; flushing receive path", e);
                let _ = port.clear(ClearBuffer::Input);
                assembler.clear();
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Bounded blocking send from a pump thread; `true` if the message was
/// queued, `false` if it had to be dropped.
fn blocking_send(queue: &mpsc::Sender<BusMessage>, msg: BusMessage, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut pending = msg;

    loop {
        match queue.try_send(pending) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if Instant::now() >= deadline {
                    warn!(
                        "inbound queue full, dropping message from 0x{:02X}",
                        back.source
                    );
                    return false;
                }
                pending = back;
                thread::sleep(Duration::from_millis(5));
            }
            Err(TrySendError::Closed(_)) => return false,
        }
    }
}

fn tx_pump(mut port: Box<dyn SerialPort>, mut outbound: mpsc::Receiver<BusMessage>) {
    while let Some(msg) = outbound.blocking_recv() {
        let bytes = msg.to_bytes();
        debug!(
            "KBUS 0x{:02X} <-- 0x{:02X} {:02X?}",
            msg.destination, msg.source, msg.body
        );

        // Half duplex: finish this frame on the wire before the next one.
        if let Err(e) = port.write_all(&bytes).and_then(|_| port.flush()) {
            warn!("K-Bus write error: {}", e);
            let _ = port.clear(ClearBuffer::Output);
        }
    }
    info!("outbound queue closed, transmit pump exiting");
}
