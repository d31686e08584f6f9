//! Virtual panel for testing
//!
//! Emulates the panel firmware: it answers the handshake ping, stores the
//! layout it is sent and reports malformed lines with an `E` message. The
//! state can be inspected by tests after a bridge has driven it.

use cockpit_protocol::{
    DeviceMessage, FieldDefinition, FieldId, KnobId, KnobSpec, PanelCommand, Rgb565,
    SwitchBitmap, FIRMWARE_ID, KNOB_COUNT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for creating a virtual panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPanelConfig {
    /// Identifier sent in reply to a ping
    pub firmware_id: String,
}

impl Default for VirtualPanelConfig {
    fn default() -> Self {
        Self {
            firmware_id: FIRMWARE_ID.to_string(),
        }
    }
}

/// One screen field as the panel knows it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelField {
    pub definition: Option<FieldDefinition>,
    pub text: String,
}

/// Knob attached to a field
#[derive(Debug, Clone, PartialEq)]
pub struct KnobBinding {
    pub spec: KnobSpec,
    pub field: FieldId,
    pub value: String,
}

/// Result of feeding one line to the panel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineResponse {
    /// Decoded command, `None` for empty or malformed lines
    pub command: Option<PanelCommand>,
    /// Lines the panel answers with
    pub replies: Vec<DeviceMessage>,
}

/// Simulated panel firmware
#[derive(Debug, Clone)]
pub struct VirtualPanel {
    config: VirtualPanelConfig,
    background: Option<Rgb565>,
    fields: Vec<PanelField>,
    knobs: [Option<KnobBinding>; KNOB_COUNT],
    switches: SwitchBitmap,
    commits: usize,
    resets: usize,
    /// Commands received (for test verification)
    received: Vec<PanelCommand>,
}

impl VirtualPanel {
    pub fn new(config: VirtualPanelConfig) -> Self {
        Self {
            config,
            background: None,
            fields: Vec::new(),
            knobs: Default::default(),
            switches: SwitchBitmap::default(),
            commits: 0,
            resets: 0,
            received: Vec::new(),
        }
    }

    pub fn firmware_id(&self) -> &str {
        &self.config.firmware_id
    }

    pub fn background(&self) -> Option<Rgb565> {
        self.background
    }

    pub fn fields(&self) -> &[PanelField] {
        &self.fields
    }

    /// Text currently shown in a field, by 1-based wire id
    pub fn text(&self, field: u8) -> Option<&str> {
        let id = FieldId::new(field)?;
        self.fields.get(id.index()).map(|f| f.text.as_str())
    }

    pub fn knob(&self, knob: KnobId) -> Option<&KnobBinding> {
        self.knobs[knob.index()].as_ref()
    }

    pub fn switches(&self) -> SwitchBitmap {
        self.switches
    }

    /// Number of `S` commits seen
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Number of `R` releases seen
    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn received(&self) -> &[PanelCommand] {
        &self.received
    }

    /// Process one line sent by the engine
    pub fn process_line(&mut self, line: &str) -> LineResponse {
        let command = match PanelCommand::decode(line) {
            Ok(Some(command)) => command,
            Ok(None) => return LineResponse::default(),
            Err(e) => {
                warn!("Virtual panel rejected {:?}: {}", line, e);
                return LineResponse {
                    command: None,
                    replies: vec![DeviceMessage::Error(e.to_string())],
                };
            }
        };
        debug!("Virtual panel received {}", command);

        let replies = self.apply(&command);
        self.received.push(command.clone());
        LineResponse {
            command: Some(command),
            replies,
        }
    }

    fn apply(&mut self, command: &PanelCommand) -> Vec<DeviceMessage> {
        match command {
            PanelCommand::Ping => {
                return vec![DeviceMessage::Firmware(self.config.firmware_id.clone())];
            }
            PanelCommand::BeginLayout { field_count } => {
                self.fields = vec![PanelField::default(); usize::from(*field_count)];
                self.knobs = Default::default();
            }
            PanelCommand::Background(color) => self.background = Some(*color),
            PanelCommand::DefineField { field, definition } => {
                let Some(slot) = self.fields.get_mut(field.index()) else {
                    return vec![out_of_range(*field)];
                };
                slot.definition = Some(*definition);
            }
            PanelCommand::SetText { field, text } => {
                let Some(slot) = self.fields.get_mut(field.index()) else {
                    return vec![out_of_range(*field)];
                };
                slot.text = text.clone();
            }
            PanelCommand::BindKnob { spec, field, .. } => {
                if field.index() >= self.fields.len() {
                    return vec![out_of_range(*field)];
                }
                self.knobs[spec.knob.index()] = Some(KnobBinding {
                    spec: *spec,
                    field: *field,
                    value: String::new(),
                });
            }
            PanelCommand::SetKnobValue { knob, value } => {
                let Some(binding) = self.knobs[knob.index()].as_mut() else {
                    return vec![DeviceMessage::Error(format!("knob {knob} not bound"))];
                };
                binding.value = value.as_str().to_string();
                let field = binding.field;
                if let Some(slot) = self.fields.get_mut(field.index()) {
                    slot.text = value.as_str().to_string();
                }
            }
            PanelCommand::CommitLayout => self.commits += 1,
            PanelCommand::Reset => {
                self.resets += 1;
                self.background = None;
                self.fields.clear();
                self.knobs = Default::default();
            }
        }
        Vec::new()
    }

    /// Operator turned a knob to `value`
    pub fn turn_knob(&mut self, knob: KnobId, value: &str) -> DeviceMessage {
        if let Some(binding) = self.knobs[knob.index()].as_mut() {
            binding.value = value.to_string();
        }
        DeviceMessage::KnobTurned {
            knob,
            value: value.to_string(),
        }
    }

    /// Operator flipped a switch; the firmware always reports the full bitmap
    pub fn set_switch(&mut self, index: usize, on: bool) -> DeviceMessage {
        self.switches.set(index, on);
        DeviceMessage::Switches(self.switches)
    }
}

fn out_of_range(field: FieldId) -> DeviceMessage {
    DeviceMessage::Error(format!("field {field} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cockpit_protocol::EncodeLine;

    fn panel() -> VirtualPanel {
        VirtualPanel::new(VirtualPanelConfig::default())
    }

    #[test]
    fn test_ping_answers_firmware_id() {
        let mut panel = panel();
        let response = panel.process_line("P");
        assert_eq!(response.command, Some(PanelCommand::Ping));
        assert_eq!(response.replies[0].encode(), "MSFSCP0");
    }

    #[test]
    fn test_layout_is_stored() {
        let mut panel = panel();
        for line in ["C02", "B0000", "I01000000D6BA203 ", "T01HDG", "S"] {
            assert!(panel.process_line(line).replies.is_empty(), "{line}");
        }
        assert_eq!(panel.fields().len(), 2);
        assert_eq!(panel.text(1), Some("HDG"));
        assert_eq!(panel.background(), Some(Rgb565::BLACK));
        assert_eq!(panel.commits(), 1);
    }

    #[test]
    fn test_knob_value_shows_in_field() {
        let mut panel = panel();
        panel.process_line("C01");
        panel.process_line("K001000000000359Y0001");
        panel.process_line("D000270");

        let knob = panel.knob(KnobId::new(0).unwrap()).unwrap();
        assert_eq!(knob.value, "00270");
        assert_eq!(panel.text(1), Some("00270"));
    }

    #[test]
    fn test_invalid_lines_are_reported() {
        let mut panel = panel();
        let response = panel.process_line("Xjunk");
        assert_eq!(response.command, None);
        assert!(matches!(response.replies[..], [DeviceMessage::Error(_)]));

        let response = panel.process_line("T05late");
        assert!(matches!(response.replies[..], [DeviceMessage::Error(_)]));
    }

    #[test]
    fn test_reset_clears_layout() {
        let mut panel = panel();
        panel.process_line("C01");
        panel.process_line("T01ABC");
        panel.process_line("R");
        assert!(panel.fields().is_empty());
        assert_eq!(panel.resets(), 1);
    }

    #[test]
    fn test_switch_reports_full_bitmap() {
        let mut panel = panel();
        let msg = panel.set_switch(2, true);
        assert_eq!(msg.encode(), "S00100000000000000000");
    }
}
