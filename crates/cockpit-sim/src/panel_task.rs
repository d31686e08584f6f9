//! Virtual panel actor task
//!
//! Owns the firmware side of an in-memory stream. The task uses a select!
//! loop to:
//! - Read lines sent by the bridge and feed them to the [`VirtualPanel`]
//! - Write the panel's replies and operator input back to the bridge
//! - Emit every decoded command on a broadcast channel for tests

use std::io;
use std::sync::Arc;

use cockpit_protocol::{DeviceMessage, EncodeLine, KnobId, LineCodec, PanelCommand};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::panel::VirtualPanel;

/// Operator input for a virtual panel
#[derive(Debug, Clone)]
pub enum VirtualPanelCommand {
    TurnKnob { knob: KnobId, value: String },
    SetSwitch { index: usize, on: bool },
    /// Send an arbitrary line, for fault injection
    RawLine(String),
    /// Close the stream as if the cable was pulled
    Unplug,
}

/// Activity observed on a virtual panel
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualPanelEvent {
    Received(PanelCommand),
    Sent(DeviceMessage),
    Unplugged,
}

/// Run the virtual panel until the stream closes or it is unplugged
pub async fn run_virtual_panel_task<S>(
    mut stream: S,
    panel: Arc<Mutex<VirtualPanel>>,
    mut cmd_rx: mpsc::Receiver<VirtualPanelCommand>,
    event_tx: broadcast::Sender<VirtualPanelEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = [0u8; 256];
    info!("Starting virtual panel {}", panel.lock().firmware_id());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                let n = match result {
                    Ok(0) => {
                        debug!("Virtual panel stream closed");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => return Err(e),
                };
                codec.push_bytes(&buf[..n]);
                while let Some(line) = codec.next_line() {
                    let response = panel.lock().process_line(&line);
                    if let Some(command) = response.command {
                        let _ = event_tx.send(VirtualPanelEvent::Received(command));
                    }
                    for reply in response.replies {
                        send(&mut stream, &event_tx, reply).await?;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualPanelCommand::TurnKnob { knob, value }) => {
                        let msg = panel.lock().turn_knob(knob, &value);
                        send(&mut stream, &event_tx, msg).await?;
                    }
                    Some(VirtualPanelCommand::SetSwitch { index, on }) => {
                        let msg = panel.lock().set_switch(index, on);
                        send(&mut stream, &event_tx, msg).await?;
                    }
                    Some(VirtualPanelCommand::RawLine(line)) => {
                        stream.write_all(line.as_bytes()).await?;
                        stream.write_all(b"\n").await?;
                        stream.flush().await?;
                    }
                    Some(VirtualPanelCommand::Unplug) | None => {
                        info!("Virtual panel unplugged");
                        let _ = event_tx.send(VirtualPanelEvent::Unplugged);
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn send<S: AsyncWrite + Unpin>(
    stream: &mut S,
    event_tx: &broadcast::Sender<VirtualPanelEvent>,
    msg: DeviceMessage,
) -> io::Result<()> {
    stream.write_all(&msg.encode_line()).await?;
    stream.flush().await?;
    let _ = event_tx.send(VirtualPanelEvent::Sent(msg));
    Ok(())
}
