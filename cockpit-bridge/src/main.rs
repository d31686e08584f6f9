//! Cockpit Bridge
//!
//! A console application that bridges flight simulator telemetry to a serial
//! cockpit instrument panel, driven by per-aircraft presets.

mod console;
mod ports;
mod settings;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cockpit_engine::{
    CockpitBridge, DevicePort, EngineConfig, PresetChoiceRequest, SerialDevicePort,
};
use cockpit_preset::PresetLibrary;
use cockpit_sim::{VirtualDevicePort, VirtualSimulator};
use console::Command;
use settings::{PanelMode, Settings};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Handles the console drives directly
struct Rig {
    bridge: CockpitBridge,
    sim: Arc<VirtualSimulator>,
    panel: Option<Arc<VirtualDevicePort>>,
    show_traffic: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cockpit_bridge=info,cockpit_engine=info,cockpit_preset=info,\
                 cockpit_protocol=info,cockpit_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cockpit Bridge");

    let mut settings = Settings::load();
    if let Some(path) = Settings::settings_path() {
        info!("Settings: {}", path.display());
    }

    let library = match PresetLibrary::load_dir(&settings.presets_dir) {
        Ok(library) => library,
        Err(e) => {
            warn!("No presets loaded: {}", e);
            PresetLibrary::default()
        }
    };

    let (port, panel): (Arc<dyn DevicePort>, _) = match settings.panel_mode {
        PanelMode::Serial => {
            ports::check_configured_port(&settings.port);
            let port = SerialDevicePort::new(settings.port.clone(), settings.baud_rate);
            (Arc::new(port) as Arc<dyn DevicePort>, None)
        }
        PanelMode::Virtual => {
            let panel = Arc::new(VirtualDevicePort::new(
                "virtual",
                settings.virtual_panel.clone(),
            ));
            (Arc::clone(&panel) as Arc<dyn DevicePort>, Some(panel))
        }
    };
    let sim = Arc::new(VirtualSimulator::new(settings.simulator.clone()));

    let (bridge, channels) =
        CockpitBridge::new(EngineConfig::default(), library, sim.clone(), port);
    let rig = Rig {
        bridge,
        sim,
        panel,
        show_traffic: Arc::new(AtomicBool::new(false)),
    };

    tokio::spawn(console::run_event_printer(
        channels.events,
        Arc::clone(&rig.show_traffic),
    ));
    rig.bridge.start();
    if settings.keep_connected {
        rig.bridge.set_keep_connected(true).await;
    }

    let mut lines = console::spawn_stdin_reader()?;
    let mut choices = channels.choices;
    let mut pending: Option<PresetChoiceRequest> = None;
    let mut stdin_open = true;
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            Some(request) = choices.recv(), if pending.is_none() => {
                println!("{}", console::format_choice(&request));
                pending = Some(request);
            }
            line = lines.recv(), if stdin_open => {
                let Some(line) = line else {
                    // Without a console keep bridging until interrupted
                    stdin_open = false;
                    continue;
                };
                if let Some(request) = pending.take() {
                    let pick = console::parse_choice(&line, request.candidates.len());
                    let _ = request.reply.send(pick);
                    continue;
                }
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => rig.run(command).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    settings.keep_connected = rig.bridge.keep_connected();
    rig.bridge.shutdown().await;
    if let Err(e) = settings.save() {
        warn!("{:#}", e);
    }
    Ok(())
}

impl Rig {
    async fn run(&self, command: Command) {
        match command {
            Command::Connect => self.bridge.set_keep_connected(true).await,
            Command::Disconnect => self.bridge.set_keep_connected(false).await,
            Command::Status => {
                println!("Panel link: {:?}", self.bridge.link_state());
                println!("Keep connected: {}", self.bridge.keep_connected());
                match self.bridge.active_preset_name() {
                    Some(name) => println!("Active preset: {name}"),
                    None => println!("No active preset"),
                }
                if self.bridge.is_resolution_pending() {
                    println!("Aircraft change pending");
                }
            }
            Command::Ports => {
                let ports = ports::list_ports();
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("  {}", port.label());
                }
            }
            Command::Traffic(on) => self.show_traffic.store(on, Ordering::Relaxed),
            Command::Aircraft {
                title,
                model,
                aircraft_type,
            } => self.sim.load_aircraft(&title, &model, &aircraft_type),
            Command::Set { variable, value } => self.sim.set_variable(&variable, &value),
            Command::Knob { knob, value } => {
                if let Some(panel) = self.virtual_panel() {
                    panel.turn_knob(knob, value).await;
                }
            }
            Command::Switch { index, on } => {
                if let Some(panel) = self.virtual_panel() {
                    panel.set_switch(index, on).await;
                }
            }
            Command::Help => println!("{}", console::HELP),
            Command::Quit => {}
        }
    }

    fn virtual_panel(&self) -> Option<&VirtualDevicePort> {
        if self.panel.is_none() {
            println!("Only available with the virtual panel");
        }
        self.panel.as_deref()
    }
}
