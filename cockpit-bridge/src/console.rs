//! Console operator surface
//!
//! Prints indicators, the operator log and the active preset, reads operator
//! commands from stdin and answers the preset chooser.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cockpit_engine::{EngineEvent, Indicator, Link, LogLevel, PresetChoiceRequest};
use cockpit_protocol::{KnobId, SWITCH_COUNT};
use tokio::sync::mpsc;
use tracing::debug;

/// An operator command typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Status,
    Ports,
    Traffic(bool),
    /// Load another aircraft into the offline simulator
    Aircraft {
        title: String,
        model: String,
        aircraft_type: String,
    },
    /// Change an offline simulator variable
    Set { variable: String, value: String },
    /// Turn a knob on the virtual panel
    Knob { knob: KnobId, value: String },
    /// Flip a switch on the virtual panel
    Switch { index: usize, on: bool },
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  connect                       keep the panel and simulator connected
  disconnect                    release the panel and the simulator
  status                        show link state and active preset
  ports                         list serial ports
  traffic on|off                show panel traffic
  aircraft <title>|<model>|<type>  load an aircraft (offline simulator)
  set <variable>=<value>        change a simulator variable (offline simulator)
  knob <0-3> <value>            turn a knob (virtual panel)
  switch <0-19> on|off          flip a switch (virtual panel)
  quit";

impl Command {
    /// Parse one console line; blank lines are `Ok(None)`
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "connect" => Command::Connect,
            "disconnect" => Command::Disconnect,
            "status" => Command::Status,
            "ports" => Command::Ports,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "traffic" => Command::Traffic(parse_on_off(rest)?),
            "aircraft" => {
                let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
                let [title, model, aircraft_type] = parts.as_slice() else {
                    return Err("usage: aircraft <title>|<model>|<type>".into());
                };
                if title.is_empty() {
                    return Err("aircraft title is empty".into());
                }
                Command::Aircraft {
                    title: title.to_string(),
                    model: model.to_string(),
                    aircraft_type: aircraft_type.to_string(),
                }
            }
            "set" => {
                let Some((variable, value)) = rest.split_once('=') else {
                    return Err("usage: set <variable>=<value>".into());
                };
                let variable = variable.trim();
                if variable.is_empty() {
                    return Err("variable name is empty".into());
                }
                Command::Set {
                    variable: variable.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "knob" => {
                let (knob, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: knob <0-3> <value>")?;
                let mut chars = knob.chars();
                let knob = match (chars.next(), chars.next()) {
                    (Some(c), None) => KnobId::from_char(c).map_err(|e| e.to_string())?,
                    _ => return Err(format!("invalid knob: {knob}")),
                };
                let value = value.trim();
                if value.is_empty() {
                    return Err("knob value is empty".into());
                }
                Command::Knob {
                    knob,
                    value: value.to_string(),
                }
            }
            "switch" => {
                let (index, state) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: switch <0-19> on|off")?;
                let index: usize = index
                    .parse()
                    .ok()
                    .filter(|i| *i < SWITCH_COUNT)
                    .ok_or_else(|| format!("invalid switch: {index}"))?;
                Command::Switch {
                    index,
                    on: parse_on_off(state.trim())?,
                }
            }
            other => return Err(format!("unknown command: {other} (try help)")),
        };
        Ok(Some(command))
    }
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        _ => Err(format!("expected on or off, got {s:?}")),
    }
}

/// Read an answer to the preset chooser
///
/// Candidates are numbered from 1; anything else cancels.
pub fn parse_choice(line: &str, candidates: usize) -> Option<usize> {
    line.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=candidates).contains(n))
        .map(|n| n - 1)
}

pub fn format_choice(request: &PresetChoiceRequest) -> String {
    let mut text = format!(
        "Several presets match {}. Pick one (blank to cancel):",
        request.aircraft
    );
    for (i, name) in request.candidates.iter().enumerate() {
        text.push_str(&format!("\n  {}) {}", i + 1, name));
    }
    text
}

fn link_name(link: Link) -> &'static str {
    match link {
        Link::Device => "panel",
        Link::Simulator => "simulator",
    }
}

fn indicator_name(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Inactive => "inactive",
        Indicator::Connecting => "connecting",
        Indicator::Ok => "ok",
        Indicator::Failed => "FAILED",
    }
}

/// Render an event for the console; `None` hides it
pub fn format_event(event: &EngineEvent, show_traffic: bool) -> Option<String> {
    let text = match event {
        EngineEvent::LinkChanged { link, indicator } => {
            format!("[{}] {}", link_name(*link), indicator_name(*indicator))
        }
        EngineEvent::Log { level, message } => {
            let level = match level {
                LogLevel::Info => "info",
                LogLevel::Warning => "warning",
                LogLevel::Error => "error",
            };
            format!("{level}: {message}")
        }
        EngineEvent::PresetChanged { name: Some(name) } => format!("Active preset: {name}"),
        EngineEvent::PresetChanged { name: None } => "No active preset".to_string(),
        EngineEvent::SwitchLabels(labels) => {
            let labels: Vec<String> = labels.iter().map(|l| l.replace('\n', " / ")).collect();
            format!("Switches: {}", labels.join(", "))
        }
        EngineEvent::DeviceError(message) => format!("Panel error: {message}"),
        EngineEvent::DeviceTraffic { direction, line } => {
            if !show_traffic {
                return None;
            }
            format!("{direction} {line}")
        }
        EngineEvent::KeepConnectedChanged(keep) => {
            format!("Keep connected: {}", if *keep { "on" } else { "off" })
        }
    };
    Some(text)
}

/// Print bridge events until the bridge goes away
pub async fn run_event_printer(
    mut events: mpsc::Receiver<EngineEvent>,
    show_traffic: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        if let Some(text) = format_event(&event, show_traffic.load(Ordering::Relaxed)) {
            println!("{text}");
        }
    }
    debug!("Event stream closed");
}

/// Forward stdin lines from a plain thread
///
/// A blocking read cannot be cancelled, so it must not live on the runtime's
/// blocking pool or shutdown would wait for the next keypress.
pub fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}
