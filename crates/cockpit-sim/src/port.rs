//! Virtual device port
//!
//! A [`DevicePort`] whose `open` plugs in a fresh [`VirtualPanel`] behind an
//! in-memory duplex stream. Each open replaces the previous panel link, like
//! re-plugging the USB cable.

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cockpit_engine::{BoxedDeviceIo, DevicePort};
use cockpit_protocol::KnobId;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::panel::{VirtualPanel, VirtualPanelConfig};
use crate::panel_task::{run_virtual_panel_task, VirtualPanelCommand, VirtualPanelEvent};

/// Buffer size of the in-memory link
const LINK_BUFFER: usize = 4096;

pub struct VirtualDevicePort {
    name: String,
    config: VirtualPanelConfig,
    panel: Arc<Mutex<VirtualPanel>>,
    commands: Mutex<Option<mpsc::Sender<VirtualPanelCommand>>>,
    events: broadcast::Sender<VirtualPanelEvent>,
    opens: AtomicUsize,
}

impl VirtualDevicePort {
    pub fn new(name: impl Into<String>, config: VirtualPanelConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            panel: Arc::new(Mutex::new(VirtualPanel::new(config.clone()))),
            config,
            commands: Mutex::new(None),
            events,
            opens: AtomicUsize::new(0),
        }
    }

    /// Shared state of the currently plugged-in panel
    pub fn panel(&self) -> Arc<Mutex<VirtualPanel>> {
        Arc::clone(&self.panel)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VirtualPanelEvent> {
        self.events.subscribe()
    }

    /// How many times the bridge opened this port
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub async fn turn_knob(&self, knob: KnobId, value: impl Into<String>) -> bool {
        self.command(VirtualPanelCommand::TurnKnob {
            knob,
            value: value.into(),
        })
        .await
    }

    pub async fn set_switch(&self, index: usize, on: bool) -> bool {
        self.command(VirtualPanelCommand::SetSwitch { index, on })
            .await
    }

    pub async fn send_raw(&self, line: impl Into<String>) -> bool {
        self.command(VirtualPanelCommand::RawLine(line.into())).await
    }

    pub async fn unplug(&self) -> bool {
        let sent = self.command(VirtualPanelCommand::Unplug).await;
        self.commands.lock().take();
        sent
    }

    async fn command(&self, command: VirtualPanelCommand) -> bool {
        let tx = self.commands.lock().clone();
        match tx {
            Some(tx) => tx.send(command).await.is_ok(),
            None => {
                warn!("Virtual panel {} is not plugged in", self.name);
                false
            }
        }
    }
}

impl DevicePort for VirtualDevicePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<BoxedDeviceIo> {
        let runtime = Handle::try_current().map_err(|e| io::Error::new(ErrorKind::Other, e))?;
        let (near, far) = tokio::io::duplex(LINK_BUFFER);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        *self.panel.lock() = VirtualPanel::new(self.config.clone());
        // Dropping the previous sender stops the previous panel task
        *self.commands.lock() = Some(cmd_tx);
        let count = self.opens.fetch_add(1, Ordering::SeqCst) + 1;

        let panel = Arc::clone(&self.panel);
        let events = self.events.clone();
        let name = self.name.clone();
        runtime.spawn(async move {
            if let Err(e) = run_virtual_panel_task(far, panel, cmd_rx, events).await {
                warn!("Virtual panel {} failed: {}", name, e);
            }
        });

        info!("Virtual panel {} plugged in (#{})", self.name, count);
        Ok(Box::new(near))
    }
}
