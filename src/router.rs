//! K-Bus Message Router
//!
//! Every decoded message is dispatched by destination to the matching
//! emulator queue, and independently by source: steering wheel traffic
//! feeds the gesture machine no matter where the wheel addressed it.

use crate::bt::BtCommand;
use crate::codec::{addr, cmd, BusMessage};
use crate::mfl::MflMachine;
use crate::transport;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

pub struct Router {
    cdc: mpsc::Sender<BusMessage>,
    sdrs: mpsc::Sender<BusMessage>,
    tel: mpsc::Sender<BusMessage>,
    bt_commands: mpsc::Sender<BtCommand>,
    mfl: MflMachine,
    ignition_on: bool,
}

impl Router {
    pub fn new(
        cdc: mpsc::Sender<BusMessage>,
        sdrs: mpsc::Sender<BusMessage>,
        tel: mpsc::Sender<BusMessage>,
        bt_commands: mpsc::Sender<BtCommand>,
    ) -> Self {
        Self {
            cdc,
            sdrs,
            tel,
            bt_commands,
            mfl: MflMachine::new(),
            ignition_on: false,
        }
    }

    pub async fn run(mut self, mut inbound: mpsc::Receiver<BusMessage>) {
        info!("message router up");
        while let Some(msg) = inbound.recv().await {
            self.dispatch(msg).await;
        }
        info!("inbound queue closed, router exiting");
    }

    pub(crate) async fn dispatch(&mut self, msg: BusMessage) {
        if msg.source == addr::MFL {
            if let Some(command) = self.mfl.handle(&msg) {
                transport::send_or_drop("bluetooth command", &self.bt_commands, command).await;
            }
        }

        match msg.destination {
            // Our own transmissions, echoed back on the shared half-duplex
            // line.
            addr::LOC => {}
            addr::GLO => self.broadcast(&msg).await,
            addr::CDC => Self::forward("cdc", &self.cdc, msg).await,
            addr::SDRS => Self::forward("sdrs", &self.sdrs, msg).await,
            addr::TEL => Self::forward("tel", &self.tel, msg).await,
            other => trace!("ignoring message for 0x{:02X}", other),
        }
    }

    /// Global broadcasts carry all sorts of vehicle chatter; only the
    /// ignition status is interesting here.
    async fn broadcast(&mut self, msg: &BusMessage) {
        if msg.body.len() < 2 || msg.body[0] != cmd::IGN_STAT_RPLY {
            return;
        }

        let state = msg.body[1];
        debug!("ignition status 0x{:02X}", state);

        // Bit 1 is the run position. Ask the phone to connect the first
        // time the key comes on; the ignition report itself never reaches
        // an emulator.
        let on = state & 0x02 != 0;
        if on && !self.ignition_on {
            info!("ignition on, requesting Bluetooth connection");
            transport::send_or_drop("bluetooth command", &self.bt_commands, BtCommand::Connect)
                .await;
        }
        self.ignition_on = on;
    }

    async fn forward(name: &str, queue: &mpsc::Sender<BusMessage>, msg: BusMessage) {
        transport::send_or_drop(name, queue, msg).await;
    }
}
