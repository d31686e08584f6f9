//! Protocol engine
//!
//! [`ProtocolEngine`] owns everything the panel link, the simulator link and
//! the resolver share: the preset library and the active preset, the knob
//! table, the last switch bitmap and the link state. It performs no I/O.
//! Every entry point takes the current time where timing matters and returns
//! the [`Effect`]s the caller must carry out, in order.
//!
//! # Link states
//!
//! ```text
//! Disconnected --transport--> AwaitingHandshake --M ok--> Active
//!                                     |
//!                                     +--anything else--> Failed
//! ```

use std::time::Instant;

use cockpit_preset::{
    default_switch_labels, AircraftIdentity, CockpitPreset, EventHandle, EventRef, PresetLibrary,
    Resolution, ScreenField, SimVariable, SimVersion, SwitchAction,
};
use cockpit_protocol::{
    DeviceMessage, EncodeLine, FieldId, KnobId, KnobValue, PanelCommand, SwitchBitmap,
};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, Indicator, Link};
use crate::render::{event_payload, fit_width, parse_bool, render_value};
use crate::state::{KnobTable, LinkState};

/// Requests for the simulator link
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    /// Drop the previous preset's subscriptions
    ClearSubscriptions,
    Subscribe(SimVariable),
    SetValue { variable: SimVariable, value: String },
    /// Calculator code for the scripting side-channel
    Execute(String),
    Transmit { handle: EventHandle, payload: u32 },
    /// Register a field's write event; report the handle with [`ProtocolEngine::bind_field_event`]
    RegisterFieldEvent {
        generation: u64,
        field: usize,
        event: String,
    },
    /// Register a switch event; report the handle with [`ProtocolEngine::bind_switch_event`]
    RegisterSwitchEvent {
        generation: u64,
        switch: usize,
        on: bool,
        event: String,
    },
}

/// One step the driver has to perform
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write a line to the panel
    Device(PanelCommand),
    /// Pause before the next panel write
    Settle,
    Sim(SimCommand),
    Notify(EngineEvent),
    /// Run [`ProtocolEngine::activation_plan`] on the activation task
    Activate,
    /// Start the coalescing window for preset resolution
    ScheduleResolution,
    /// Arm `knob` once the preceding `D` line reached the panel writer
    ArmKnob { generation: u64, knob: KnobId },
    /// Clear the keep-connected intent and close the panel transport
    SuspendReconnect,
}

/// Shared state machine between the panel and the simulator
#[derive(Debug)]
pub struct ProtocolEngine {
    config: EngineConfig,
    library: PresetLibrary,
    active: Option<usize>,
    identity: AircraftIdentity,
    sim_version: SimVersion,
    link: LinkState,
    knobs: KnobTable,
    switches: SwitchBitmap,
    /// Bumped per activation so late event registrations can be discarded
    generation: u64,
}

impl ProtocolEngine {
    pub fn new(library: PresetLibrary, config: EngineConfig) -> Self {
        Self {
            config,
            library,
            active: None,
            identity: AircraftIdentity::default(),
            sim_version: SimVersion::Unknown,
            link: LinkState::Disconnected,
            knobs: KnobTable::new(),
            switches: SwitchBitmap::default(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn library(&self) -> &PresetLibrary {
        &self.library
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn active_preset(&self) -> Option<&CockpitPreset> {
        self.active.and_then(|id| self.library.get(id))
    }

    pub fn active_preset_name(&self) -> Option<&str> {
        self.active_preset().map(|p| p.name.as_str())
    }

    pub fn identity(&self) -> &AircraftIdentity {
        &self.identity
    }

    pub fn sim_version(&self) -> SimVersion {
        self.sim_version
    }

    pub fn set_sim_version(&mut self, version: SimVersion) {
        self.sim_version = version;
    }

    pub fn knobs(&self) -> &KnobTable {
        &self.knobs
    }

    /// Last switch bitmap reported by the panel
    pub fn switch_state(&self) -> SwitchBitmap {
        self.switches
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ------------------------------------------------------------------------
    // Link lifecycle
    // ------------------------------------------------------------------------

    /// The panel transport opened; the handshake starts over
    pub fn transport_connected(&mut self) -> Vec<Effect> {
        self.link = LinkState::AwaitingHandshake;
        self.knobs.disarm_all();
        vec![
            Effect::Notify(EngineEvent::link(Link::Device, Indicator::Connecting)),
            Effect::Device(PanelCommand::Ping),
        ]
    }

    /// The panel transport dropped
    pub fn transport_lost(&mut self) -> Vec<Effect> {
        self.knobs.disarm_all();
        match self.link {
            LinkState::Failed | LinkState::Disconnected => Vec::new(),
            LinkState::AwaitingHandshake | LinkState::Active => {
                self.link = LinkState::Disconnected;
                warn!("Panel link lost");
                vec![
                    Effect::Notify(EngineEvent::warning("Panel disconnected")),
                    Effect::Notify(EngineEvent::link(Link::Device, Indicator::Failed)),
                ]
            }
        }
    }

    /// Ping to send on a supervisor tick, while the handshake is pending
    pub fn handshake_ping(&self) -> Option<PanelCommand> {
        (self.link == LinkState::AwaitingHandshake).then_some(PanelCommand::Ping)
    }

    /// The operator withdrew the keep-connected intent
    pub fn close_session(&mut self) -> Vec<Effect> {
        self.link = LinkState::Disconnected;
        self.active = None;
        self.knobs.clear();
        info!("Session closed");
        vec![
            Effect::Notify(EngineEvent::PresetChanged { name: None }),
            Effect::Notify(EngineEvent::SwitchLabels(default_switch_labels())),
            Effect::Notify(EngineEvent::link(Link::Device, Indicator::Inactive)),
        ]
    }

    /// Leave the failed state so the next connection attempt starts fresh
    pub fn clear_failure(&mut self) {
        if self.link == LinkState::Failed {
            self.link = LinkState::Disconnected;
        }
    }

    // ------------------------------------------------------------------------
    // Panel -> simulator
    // ------------------------------------------------------------------------

    /// Decode and handle one line from the panel
    pub fn handle_device_line(&mut self, line: &str, now: Instant) -> Vec<Effect> {
        match DeviceMessage::decode(line) {
            Ok(Some(msg)) => self.handle_device_message(msg, now),
            Ok(None) => Vec::new(),
            Err(_) if self.link == LinkState::AwaitingHandshake => {
                self.fail_handshake(line.trim_end().to_string())
            }
            Err(e) => {
                let err = EngineError::MalformedMessage(e);
                warn!("Dropping panel line {:?}: {}", line, err);
                vec![Effect::Notify(EngineEvent::warning(format!(
                    "Dropped panel message {line:?}: {err}"
                )))]
            }
        }
    }

    pub fn handle_device_message(&mut self, msg: DeviceMessage, now: Instant) -> Vec<Effect> {
        match self.link {
            LinkState::AwaitingHandshake => self.handle_handshake(msg),
            LinkState::Active => match msg {
                DeviceMessage::KnobTurned { knob, value } => self.handle_knob(knob, &value, now),
                DeviceMessage::Switches(bits) => self.handle_switches(bits),
                DeviceMessage::Error(text) => {
                    warn!("Panel reported: {}", text);
                    vec![
                        Effect::Notify(EngineEvent::warning(format!("Panel error: {text}"))),
                        Effect::Notify(EngineEvent::DeviceError(text)),
                    ]
                }
                DeviceMessage::Firmware(id) => {
                    debug!("Ignoring repeated firmware id {}", id);
                    Vec::new()
                }
            },
            LinkState::Disconnected | LinkState::Failed => {
                debug!("Ignoring panel message {} while {:?}", msg, self.link);
                Vec::new()
            }
        }
    }

    fn handle_handshake(&mut self, msg: DeviceMessage) -> Vec<Effect> {
        match msg {
            DeviceMessage::Firmware(id) if id == self.config.firmware_id => {
                self.link = LinkState::Active;
                info!("Panel firmware {} verified", id);
                let mut effects = vec![
                    Effect::Notify(EngineEvent::info(format!("Panel connected, firmware {id}"))),
                    Effect::Notify(EngineEvent::link(Link::Device, Indicator::Ok)),
                ];
                if self.active.is_some() {
                    effects.push(Effect::Activate);
                }
                effects
            }
            other => self.fail_handshake(other.encode()),
        }
    }

    fn fail_handshake(&mut self, received: String) -> Vec<Effect> {
        self.link = LinkState::Failed;
        let err = EngineError::HandshakeMismatch {
            received,
            expected: self.config.firmware_id.clone(),
        };
        error!("{}", err);
        vec![
            Effect::Notify(EngineEvent::error(err.to_string())),
            Effect::Notify(EngineEvent::link(Link::Device, Indicator::Failed)),
            Effect::SuspendReconnect,
        ]
    }

    fn handle_knob(&mut self, knob: KnobId, value: &str, now: Instant) -> Vec<Effect> {
        if !self.knobs.is_armed(knob) {
            debug!("Knob {} not armed, ignoring {:?}", knob, value);
            return Vec::new();
        }
        let Some(index) = self.knobs.bound_field(knob) else {
            return Vec::new();
        };
        let Some(field) = self.active_preset().and_then(|p| p.fields.get(index)) else {
            return Vec::new();
        };

        match knob_command(knob, field, value.trim()) {
            Ok(Some(command)) => {
                self.knobs.touch(knob, now);
                vec![Effect::Sim(command)]
            }
            Ok(None) => {
                debug!("Knob {} field {} has no variable to write", knob, index);
                Vec::new()
            }
            Err(err) => {
                warn!("{}", err);
                vec![Effect::Notify(EngineEvent::warning(err.to_string()))]
            }
        }
    }

    fn handle_switches(&mut self, next: SwitchBitmap) -> Vec<Effect> {
        let transitions = self.switches.transitions_to(&next);
        self.switches = next;

        let Some(preset) = self.active_preset() else {
            debug!("Switches {} changed without an active preset", next);
            return Vec::new();
        };

        let mut effects = Vec::new();
        for transition in transitions {
            let Some(action) = preset
                .switches
                .get(transition.index)
                .and_then(|s| s.action(transition.on))
            else {
                continue;
            };
            match (&action.event, action.handle) {
                (EventRef::Script(code), _) => {
                    effects.push(Effect::Sim(SimCommand::Execute(code.clone())));
                }
                (EventRef::Native(_), Some(handle)) => {
                    effects.push(Effect::Sim(SimCommand::Transmit {
                        handle,
                        payload: action.value,
                    }));
                }
                (EventRef::Native(name), None) => {
                    debug!(
                        "Switch {} event {} is not registered, skipping",
                        transition.index, name
                    );
                }
            }
        }
        effects
    }

    // ------------------------------------------------------------------------
    // Simulator -> panel
    // ------------------------------------------------------------------------

    /// Handle a value update for a subscribed simulator variable
    pub fn handle_sim_value(&mut self, variable: &str, value: &str, now: Instant) -> Vec<Effect> {
        if self.identity.update(variable, value) {
            debug!("Aircraft {} is now {:?}", variable, value);
            return vec![Effect::ScheduleResolution];
        }

        let mut effects = Vec::new();
        let Some(preset) = self.active.and_then(|id| self.library.get_mut(id)) else {
            return effects;
        };

        let mut shown = Vec::new();
        for condition in preset
            .visibility
            .iter()
            .filter(|c| c.variable.name == variable)
        {
            let visible = condition.is_satisfied_by(value);
            if let Some(field) = preset.fields.get_mut(condition.field) {
                if visible && !field.runtime.visible {
                    shown.push(condition.field);
                }
                field.runtime.visible = visible;
            }
        }
        let bound = preset.field_for_variable(variable);

        for index in shown {
            self.push_field(index, None, now, &mut effects);
        }
        if let Some(index) = bound {
            self.push_field(index, Some(value), now, &mut effects);
        }
        effects
    }

    /// Render a field and emit the panel writes it needs
    ///
    /// `value` is `None` when an already known value is re-pushed, which
    /// happens when the field becomes visible.
    fn push_field(
        &mut self,
        index: usize,
        value: Option<&str>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let link_active = self.link.is_active();
        let debounce = self.config.knob_debounce();
        let Some(preset) = self.active.and_then(|id| self.library.get_mut(id)) else {
            return;
        };
        let (Some(field), Some(field_id)) = (preset.fields.get_mut(index), FieldId::from_index(index))
        else {
            return;
        };

        if field.is_boolean() {
            let flipped = match value {
                None => true,
                Some(raw) => match parse_bool(raw) {
                    Some(state) => {
                        let flipped = state != field.runtime.last_bool;
                        field.runtime.last_bool = state;
                        flipped
                    }
                    None => {
                        warn!("Field {} expects a number, got {:?}", index, raw);
                        false
                    }
                },
            };
            field.runtime.text = fit_width(field.boolean_text(), field.width(), ' ');
            if flipped && field.runtime.visible && link_active {
                effects.push(Effect::Device(PanelCommand::DefineField {
                    field: field_id,
                    definition: field.current_definition(),
                }));
                effects.push(Effect::Device(PanelCommand::SetText {
                    field: field_id,
                    text: field.runtime.text.clone(),
                }));
            }
            return;
        }

        if let Some(raw) = value {
            field.runtime.text = render_value(field, raw);
        }
        if !link_active {
            return;
        }

        let Some(spec) = field.knob else {
            if field.runtime.visible {
                effects.push(Effect::Device(PanelCommand::SetText {
                    field: field_id,
                    text: fit_width(&field.runtime.text, field.width(), ' '),
                }));
            }
            return;
        };

        if value.is_none() {
            effects.extend(bind_knob(field, field_id).into_iter().map(Effect::Device));
            self.knobs.bind(spec.knob, index);
            effects.push(Effect::ArmKnob {
                generation: self.generation,
                knob: spec.knob,
            });
        } else if self.knobs.bound_field(spec.knob) != Some(index) {
            debug!("Knob {} edits another field, not pushing field {}", spec.knob, index);
        } else if self.knobs.is_settling(spec.knob, now, debounce) {
            debug!(
                "Knob {} recently turned, holding back {:?}",
                spec.knob, field.runtime.text
            );
        } else {
            effects.push(Effect::Device(PanelCommand::SetKnobValue {
                knob: spec.knob,
                value: KnobValue::new(&field.runtime.text),
            }));
            effects.push(Effect::ArmKnob {
                generation: self.generation,
                knob: spec.knob,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Preset resolution and activation
    // ------------------------------------------------------------------------

    /// Run the resolver for the current aircraft
    pub fn resolve(&self) -> Resolution {
        self.library.resolve(&self.identity, self.sim_version)
    }

    /// Title used to name the aircraft in log lines
    pub fn aircraft_label(&self) -> String {
        if self.identity.title.is_empty() {
            self.identity.model.clone()
        } else {
            self.identity.title.clone()
        }
    }

    /// Make the resolver's choice the active preset
    ///
    /// An ambiguous outcome has to be settled with
    /// [`Resolution::with_choice`] first; left unsettled it counts as no match.
    pub fn apply_resolution(&mut self, resolution: Resolution) -> Vec<Effect> {
        let aircraft = self.aircraft_label();
        let mut effects = Vec::new();

        if let Resolution::DefaultApplied(_) = resolution {
            info!("No preset found for aircraft: {}. Using the default preset", aircraft);
            effects.push(Effect::Notify(EngineEvent::info(format!(
                "No preset found for aircraft: {aircraft}. Using the default preset"
            ))));
        }

        // The old layout's knob bindings and pending registrations are void
        // from here on, even before the new layout is uploaded
        self.knobs.clear();
        self.generation += 1;

        let current = self.active;
        let selected = resolution.selected().and_then(|id| {
            let preset = if current == Some(id) {
                self.library.get(id)
            } else {
                self.library.select(id)
            };
            preset.map(|p| (id, p.name.clone(), p.switch_labels()))
        });

        match selected {
            Some((id, name, labels)) => {
                self.active = Some(id);
                info!("Preset '{}' selected for {}", name, aircraft);
                effects.push(Effect::Notify(EngineEvent::info(format!("Preset: {name}"))));
                effects.push(Effect::Notify(EngineEvent::PresetChanged { name: Some(name) }));
                effects.push(Effect::Notify(EngineEvent::SwitchLabels(labels)));
                if self.link.is_active() {
                    effects.push(Effect::Activate);
                }
            }
            None => {
                self.active = None;
                let err = EngineError::UnresolvedPreset { aircraft };
                warn!("{}", err);
                effects.push(Effect::Notify(EngineEvent::warning(err.to_string())));
                effects.push(Effect::Notify(EngineEvent::PresetChanged { name: None }));
                effects.push(Effect::Notify(EngineEvent::SwitchLabels(default_switch_labels())));
            }
        }
        effects
    }

    /// Full layout upload for the active preset
    ///
    /// Empty unless the link is active and a preset is selected. Knob
    /// bindings are rebuilt from scratch and every registration request is
    /// tagged with a fresh generation.
    pub fn activation_plan(&mut self) -> Vec<Effect> {
        if !self.link.is_active() {
            return Vec::new();
        }
        let Some(preset) = self.active.and_then(|id| self.library.get_mut(id)) else {
            return Vec::new();
        };

        preset.restart_runtime();
        self.knobs.clear();
        self.generation += 1;
        let generation = self.generation;
        info!(
            "Activating preset '{}' ({} fields, generation {})",
            preset.name,
            preset.fields.len(),
            generation
        );

        let field_count = u8::try_from(preset.fields.len()).unwrap_or(FieldId::MAX);
        let mut effects = vec![
            Effect::Sim(SimCommand::ClearSubscriptions),
            Effect::Device(PanelCommand::BeginLayout { field_count }),
            Effect::Device(PanelCommand::Background(preset.background)),
        ];

        for (index, field) in preset.fields.iter_mut().enumerate() {
            let Some(field_id) = FieldId::from_index(index) else {
                break;
            };
            effects.push(Effect::Device(PanelCommand::DefineField {
                field: field_id,
                definition: field.current_definition(),
            }));
            if field.runtime.visible {
                match field.knob {
                    Some(spec) => {
                        effects.extend(bind_knob(field, field_id).into_iter().map(Effect::Device));
                        self.knobs.bind(spec.knob, index);
                        effects.push(Effect::ArmKnob {
                            generation,
                            knob: spec.knob,
                        });
                    }
                    None => {
                        let text = if field.is_boolean() {
                            field.boolean_text()
                        } else {
                            field.runtime.text.as_str()
                        };
                        effects.push(Effect::Device(PanelCommand::SetText {
                            field: field_id,
                            text: fit_width(text, field.width(), ' '),
                        }));
                    }
                }
            }
            effects.push(Effect::Settle);
        }
        effects.push(Effect::Device(PanelCommand::CommitLayout));

        effects.extend(
            preset
                .subscriptions()
                .into_iter()
                .map(|v| Effect::Sim(SimCommand::Subscribe(v))),
        );
        for (index, field) in preset.fields.iter().enumerate() {
            if let Some(EventRef::Native(event)) = &field.event {
                effects.push(Effect::Sim(SimCommand::RegisterFieldEvent {
                    generation,
                    field: index,
                    event: event.clone(),
                }));
            }
        }
        for (index, switch) in preset.switches.iter().enumerate() {
            for on in [true, false] {
                if let Some(SwitchAction {
                    event: EventRef::Native(event),
                    ..
                }) = switch.action(on)
                {
                    effects.push(Effect::Sim(SimCommand::RegisterSwitchEvent {
                        generation,
                        switch: index,
                        on,
                        event: event.clone(),
                    }));
                }
            }
        }
        effects.push(Effect::Notify(EngineEvent::SwitchLabels(preset.switch_labels())));
        effects
    }

    /// Store the handle of a field event; stale generations are dropped
    pub fn bind_field_event(&mut self, generation: u64, field: usize, handle: EventHandle) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(field) = self
            .active
            .and_then(|id| self.library.get_mut(id))
            .and_then(|p| p.fields.get_mut(field))
        else {
            return false;
        };
        field.runtime.event_handle = Some(handle);
        true
    }

    /// The `D` line for `knob` was handed to the panel writer
    ///
    /// Arms the knob unless a newer layout replaced its binding meanwhile.
    pub fn knob_written(&mut self, generation: u64, knob: KnobId) -> bool {
        if generation != self.generation || self.knobs.bound_field(knob).is_none() {
            return false;
        }
        self.knobs.arm(knob);
        true
    }

    /// Store the handle of a switch event; stale generations are dropped
    pub fn bind_switch_event(
        &mut self,
        generation: u64,
        switch: usize,
        on: bool,
        handle: EventHandle,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(action) = self
            .active
            .and_then(|id| self.library.get_mut(id))
            .and_then(|p| p.switches.get_mut(switch))
            .and_then(|s| s.action_mut(on))
        else {
            return false;
        };
        action.handle = Some(handle);
        true
    }
}

/// `K` then `D` for a knob-bound field
fn bind_knob(field: &ScreenField, field_id: FieldId) -> Vec<PanelCommand> {
    let Some(spec) = field.knob else {
        return Vec::new();
    };
    vec![
        PanelCommand::BindKnob {
            spec,
            field: field_id,
            decimal_places: field.decimal_places,
            step: field.knob_step,
        },
        PanelCommand::SetKnobValue {
            knob: spec.knob,
            value: KnobValue::new(&field.runtime.text),
        },
    ]
}

/// Simulator write for a knob turned to `value`
fn knob_command(
    knob: KnobId,
    field: &ScreenField,
    value: &str,
) -> Result<Option<SimCommand>, EngineError> {
    let Some(variable) = field.variable.as_ref() else {
        return Ok(None);
    };
    let number = || {
        value.parse::<f64>().map_err(|_| EngineError::NumericDecode {
            knob: knob.to_string(),
            text: value.to_string(),
        })
    };

    let command = match (&field.event, field.runtime.event_handle) {
        (Some(EventRef::Script(code)), _) => {
            number()?;
            SimCommand::Execute(format!("{value} {code}"))
        }
        (Some(EventRef::Native(event)), Some(handle)) => SimCommand::Transmit {
            handle,
            payload: event_payload(event, &variable.unit, number()?),
        },
        (Some(EventRef::Native(_)), None) | (None, _) => write_variable(variable, value),
    };
    Ok(Some(command))
}

/// Direct variable write; computed variables go through the side-channel
fn write_variable(variable: &SimVariable, value: &str) -> SimCommand {
    match variable.name.strip_prefix('(') {
        Some(inner) => SimCommand::Execute(format!("{value} (>{inner}")),
        None => SimCommand::SetValue {
            variable: variable.clone(),
            value: value.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HDG_PRESET: &str = r#"{
        "presetName": "C172",
        "screenFieldItems": [
            {"text": "HDG", "textWidth": 3},
            {"text": "000", "textWidth": 3, "simVariable": "AUTOPILOT HEADING LOCK DIR",
             "unitOfMeasure": "degrees", "simvarType": "TYPE_NUMBER",
             "knobSpec": "0000000000359Y", "simEvent": "HEADING_BUG_SET"}
        ],
        "switchDefItems": [
            {"switchLabel": "AP", "simEventOn": "AP_MASTER", "simEventOnValue": 1},
            {"switchLabel": "GEAR", "simEventOff": "!(>K:GEAR_UP)"}
        ]
    }"#;

    fn engine(json: &str) -> ProtocolEngine {
        let library = PresetLibrary::new(vec![PresetLibrary::parse(json).unwrap()]);
        ProtocolEngine::new(library, EngineConfig::default())
    }

    fn active_engine(json: &str) -> ProtocolEngine {
        let mut engine = engine(json);
        engine.apply_resolution(Resolution::Matched(0));
        engine.transport_connected();
        engine.handle_device_line("MSFSCP0", Instant::now());
        let plan = engine.activation_plan();
        deliver(&mut engine, &plan);
        engine
    }

    /// Arm knobs the way the bridge does once their `D` lines are queued
    fn deliver(engine: &mut ProtocolEngine, effects: &[Effect]) {
        for effect in effects {
            if let Effect::ArmKnob { generation, knob } = effect {
                engine.knob_written(*generation, *knob);
            }
        }
    }

    fn device_lines(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Device(cmd) => Some(cmd.encode()),
                _ => None,
            })
            .collect()
    }

    fn sim_commands(effects: &[Effect]) -> Vec<SimCommand> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Sim(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_handshake_success_requests_activation() {
        let mut engine = engine(HDG_PRESET);
        engine.apply_resolution(Resolution::Matched(0));
        let effects = engine.transport_connected();
        assert_eq!(device_lines(&effects), vec!["P"]);
        assert_eq!(engine.handshake_ping(), Some(PanelCommand::Ping));

        let effects = engine.handle_device_line("MSFSCP0\r", Instant::now());
        assert_eq!(engine.link_state(), LinkState::Active);
        assert!(effects.contains(&Effect::Activate));
        assert_eq!(engine.handshake_ping(), None);
    }

    #[test]
    fn test_handshake_without_preset_does_not_activate() {
        let mut engine = engine(HDG_PRESET);
        engine.transport_connected();
        let effects = engine.handle_device_line("MSFSCP0", Instant::now());
        assert!(!effects.contains(&Effect::Activate));
        assert!(engine.activation_plan().is_empty());
    }

    #[test]
    fn test_handshake_mismatch_is_fatal() {
        let mut engine = engine(HDG_PRESET);
        engine.transport_connected();
        let effects = engine.handle_device_line("MOTHER1", Instant::now());
        assert_eq!(engine.link_state(), LinkState::Failed);
        assert!(effects.contains(&Effect::SuspendReconnect));
        assert!(effects.contains(&Effect::Notify(EngineEvent::error(
            "no compatible panel found. Received: MOTHER1 Expected: SFSCP0"
        ))));

        // Nothing gets through until the operator retries
        assert!(engine.handle_device_line("MSFSCP0", Instant::now()).is_empty());
        assert!(engine.transport_lost().is_empty());
        assert_eq!(engine.link_state(), LinkState::Failed);
        engine.clear_failure();
        assert_eq!(engine.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn test_activation_order() {
        let mut engine = engine(HDG_PRESET);
        engine.apply_resolution(Resolution::Matched(0));
        engine.transport_connected();
        engine.handle_device_line("MSFSCP0", Instant::now());
        let effects = engine.activation_plan();

        assert_eq!(
            device_lines(&effects),
            vec![
                "C02",
                "B0000",
                "I01000000D6BA203 ",
                "T01HDG",
                "I02000000D6BA203 ",
                "K002000000000359Y0001",
                "D000000",
                "S",
            ]
        );
        assert_eq!(effects.first(), Some(&Effect::Sim(SimCommand::ClearSubscriptions)));
        assert_eq!(effects.iter().filter(|e| **e == Effect::Settle).count(), 2);

        let generation = engine.generation();
        assert_eq!(
            sim_commands(&effects)[1..],
            [
                SimCommand::Subscribe(SimVariable::new("AUTOPILOT HEADING LOCK DIR", "degrees")),
                SimCommand::RegisterFieldEvent {
                    generation,
                    field: 1,
                    event: "HEADING_BUG_SET".into()
                },
                SimCommand::RegisterSwitchEvent {
                    generation,
                    switch: 0,
                    on: true,
                    event: "AP_MASTER".into()
                },
            ]
        );
        let knob = KnobId::new(0).unwrap();
        assert!(effects.contains(&Effect::ArmKnob { generation, knob }));
        assert!(!engine.knobs().is_armed(knob));
    }

    #[test]
    fn test_knob_arms_after_value_is_sent() {
        let mut engine = engine(HDG_PRESET);
        engine.apply_resolution(Resolution::Matched(0));
        engine.transport_connected();
        engine.handle_device_line("MSFSCP0", Instant::now());
        engine.activation_plan();
        let knob = KnobId::new(0).unwrap();
        let generation = engine.generation();

        assert!(engine.handle_device_line("K0123", Instant::now()).is_empty());
        assert!(!engine.knob_written(generation - 1, knob));
        assert!(!engine.knob_written(generation, KnobId::new(2).unwrap()));
        assert!(engine.knob_written(generation, knob));
        assert!(engine.knobs().is_armed(knob));
        assert!(!engine.handle_device_line("K0123", Instant::now()).is_empty());
    }

    #[test]
    fn test_unarmed_knob_is_ignored() {
        let mut engine = active_engine(HDG_PRESET);
        assert!(engine.handle_device_line("K1123", Instant::now()).is_empty());
        engine.transport_lost();
        engine.transport_connected();
        engine.handle_device_line("MSFSCP0", Instant::now());
        assert!(engine.handle_device_line("K0123", Instant::now()).is_empty());
    }

    #[test]
    fn test_knob_transmits_registered_event() {
        let mut engine = active_engine(HDG_PRESET);
        let generation = engine.generation();
        assert!(engine.bind_field_event(generation, 1, EventHandle(7)));
        assert!(!engine.bind_field_event(generation - 1, 1, EventHandle(8)));

        let effects = engine.handle_device_line("K0270", Instant::now());
        assert_eq!(
            sim_commands(&effects),
            vec![SimCommand::Transmit {
                handle: EventHandle(7),
                payload: 270
            }]
        );
    }

    #[test]
    fn test_knob_without_handle_writes_variable() {
        let mut engine = active_engine(HDG_PRESET);
        let effects = engine.handle_device_line("K0090", Instant::now());
        assert_eq!(
            sim_commands(&effects),
            vec![SimCommand::SetValue {
                variable: SimVariable::new("AUTOPILOT HEADING LOCK DIR", "degrees"),
                value: "090".into()
            }]
        );
    }

    #[test]
    fn test_non_numeric_knob_value_is_dropped() {
        let mut engine = active_engine(HDG_PRESET);
        engine.bind_field_event(engine.generation(), 1, EventHandle(7));
        let now = Instant::now();
        let effects = engine.handle_device_line("K0abc", now);
        assert!(sim_commands(&effects).is_empty());
        assert!(!engine
            .knobs()
            .is_settling(KnobId::new(0).unwrap(), now, Duration::from_millis(500)));
    }

    #[test]
    fn test_sim_push_waits_for_knob_to_settle() {
        let mut engine = active_engine(HDG_PRESET);
        let t0 = Instant::now();
        engine.handle_device_line("K0100", t0);

        let held = engine.handle_sim_value(
            "AUTOPILOT HEADING LOCK DIR",
            "100",
            t0 + Duration::from_millis(400),
        );
        assert!(device_lines(&held).is_empty());

        let pushed = engine.handle_sim_value(
            "AUTOPILOT HEADING LOCK DIR",
            "101",
            t0 + Duration::from_millis(600),
        );
        assert_eq!(device_lines(&pushed), vec!["D000101"]);
    }

    #[test]
    fn test_sim_push_held_at_window_edge() {
        let mut engine = active_engine(HDG_PRESET);
        let t0 = Instant::now();
        engine.handle_device_line("K0100", t0);

        let held = engine.handle_sim_value(
            "AUTOPILOT HEADING LOCK DIR",
            "100",
            t0 + Duration::from_millis(500),
        );
        assert!(device_lines(&held).is_empty());
    }

    #[test]
    fn test_preset_change_releases_old_knobs() {
        const TRIM_PRESET: &str = r#"{
            "presetName": "Glider",
            "screenFieldItems": [
                {"text": "TRIM", "textWidth": 4},
                {"text": "0", "textWidth": 4, "simVariable": "ELEVATOR TRIM POSITION",
                 "unitOfMeasure": "radians", "simvarType": "TYPE_NUMBER"}
            ]
        }"#;
        let library = PresetLibrary::new(vec![
            PresetLibrary::parse(HDG_PRESET).unwrap(),
            PresetLibrary::parse(TRIM_PRESET).unwrap(),
        ]);
        let mut engine = ProtocolEngine::new(library, EngineConfig::default());
        engine.apply_resolution(Resolution::Matched(0));
        engine.transport_connected();
        engine.handle_device_line("MSFSCP0", Instant::now());
        let plan = engine.activation_plan();
        deliver(&mut engine, &plan);
        let stale = engine.generation();

        let effects = engine.apply_resolution(Resolution::Matched(1));
        assert!(effects.contains(&Effect::Activate));
        assert!(engine.handle_device_line("K0050", Instant::now()).is_empty());
        assert!(!engine.knob_written(stale, KnobId::new(0).unwrap()));
        assert_eq!(engine.knobs().bound_field(KnobId::new(0).unwrap()), None);
    }

    #[test]
    fn test_reactivation_keeps_last_values() {
        let mut engine = active_engine(HDG_PRESET);
        let effects = engine.handle_sim_value("AUTOPILOT HEADING LOCK DIR", "270", Instant::now());
        assert_eq!(device_lines(&effects), vec!["D000270"]);

        let replay = engine.activation_plan();
        assert!(device_lines(&replay).contains(&"D000270".to_string()));

        engine.apply_resolution(Resolution::Matched(0));
        let replay = engine.activation_plan();
        assert!(device_lines(&replay).contains(&"D000270".to_string()));
    }

    #[test]
    fn test_switch_diff_fires_only_changed() {
        let mut engine = active_engine(HDG_PRESET);
        let generation = engine.generation();
        engine.bind_switch_event(generation, 0, true, EventHandle(3));

        let effects = engine.handle_device_line("S11000000000000000000", Instant::now());
        assert_eq!(
            sim_commands(&effects),
            vec![SimCommand::Transmit {
                handle: EventHandle(3),
                payload: 1
            }]
        );

        let effects = engine.handle_device_line("S10000000000000000000", Instant::now());
        assert_eq!(
            sim_commands(&effects),
            vec![SimCommand::Execute("(>K:GEAR_UP)".into())]
        );
        assert!(engine.switch_state().is_on(0));
        assert!(!engine.switch_state().is_on(1));
    }

    #[test]
    fn test_identification_schedules_resolution() {
        let mut engine = engine(HDG_PRESET);
        let effects = engine.handle_sim_value("ATC MODEL", "C172", Instant::now());
        assert_eq!(effects, vec![Effect::ScheduleResolution]);
        assert_eq!(engine.identity().model, "C172");
    }

    #[test]
    fn test_unresolved_clears_selection_without_panel_writes() {
        let mut engine = active_engine(HDG_PRESET);
        let effects = engine.apply_resolution(Resolution::None);
        assert!(device_lines(&effects).is_empty());
        assert!(engine.active_preset().is_none());
        assert!(effects.contains(&Effect::Notify(EngineEvent::PresetChanged { name: None })));
        assert!(!engine.knobs().is_armed(KnobId::new(0).unwrap()));
    }

    #[test]
    fn test_error_line_is_reported() {
        let mut engine = active_engine(HDG_PRESET);
        let effects = engine.handle_device_line("EBad field", Instant::now());
        assert!(effects.contains(&Effect::Notify(EngineEvent::DeviceError("Bad field".into()))));
    }

    #[test]
    fn test_malformed_line_is_dropped_when_active() {
        let mut engine = active_engine(HDG_PRESET);
        let effects = engine.handle_device_line("S0101", Instant::now());
        assert_eq!(effects.len(), 1);
        assert_eq!(engine.link_state(), LinkState::Active);
    }

    #[test]
    fn test_computed_variable_write() {
        let variable = SimVariable::new("(L:A32NX_AUTOPILOT_HEADING_SELECTED,degrees)", "");
        assert_eq!(
            write_variable(&variable, "90"),
            SimCommand::Execute("90 (>L:A32NX_AUTOPILOT_HEADING_SELECTED,degrees)".into())
        );
    }
}
