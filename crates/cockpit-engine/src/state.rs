//! Link and knob state tracking

use std::time::{Duration, Instant};

use cockpit_protocol::{KnobId, KNOB_COUNT};

/// State of the panel link as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// No transport open
    #[default]
    Disconnected,
    /// Transport open, pinging until the panel identifies itself
    AwaitingHandshake,
    /// Handshake passed; layouts and values flow
    Active,
    /// The panel failed the handshake; nothing happens until the operator retries
    Failed,
}

impl LinkState {
    pub fn is_active(self) -> bool {
        self == LinkState::Active
    }
}

/// One rotary encoder's binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnobSlot {
    /// Index of the field the knob edits
    pub field: Option<usize>,
    /// Set once the engine pushed an authoritative value
    pub armed: bool,
    /// Time of the last device-originated change
    pub last_change: Option<Instant>,
}

/// Bindings for every knob on the panel
#[derive(Debug, Clone, Default)]
pub struct KnobTable {
    slots: [KnobSlot; KNOB_COUNT],
}

impl KnobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, knob: KnobId) -> &KnobSlot {
        &self.slots[knob.index()]
    }

    /// Drop every binding, as done at the start of an activation
    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Keep bindings but refuse knob input until values are pushed again
    pub fn disarm_all(&mut self) {
        for slot in &mut self.slots {
            slot.armed = false;
        }
    }

    /// Bind `knob` to `field`; the knob stays disarmed until [`KnobTable::arm`]
    pub fn bind(&mut self, knob: KnobId, field: usize) {
        self.slots[knob.index()] = KnobSlot {
            field: Some(field),
            armed: false,
            last_change: None,
        };
    }

    pub fn arm(&mut self, knob: KnobId) {
        self.slots[knob.index()].armed = true;
    }

    pub fn bound_field(&self, knob: KnobId) -> Option<usize> {
        self.slot(knob).field
    }

    pub fn is_armed(&self, knob: KnobId) -> bool {
        self.slot(knob).armed
    }

    /// Record a device-originated change
    pub fn touch(&mut self, knob: KnobId, now: Instant) {
        self.slots[knob.index()].last_change = Some(now);
    }

    /// Whether `now` falls inside the debounce window after the last change
    pub fn is_settling(&self, knob: KnobId, now: Instant, window: Duration) -> bool {
        self.slot(knob)
            .last_change
            .is_some_and(|at| now.saturating_duration_since(at) <= window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knob(id: u8) -> KnobId {
        KnobId::new(id).unwrap()
    }

    #[test]
    fn test_bind_starts_disarmed() {
        let mut table = KnobTable::new();
        table.bind(knob(1), 4);
        assert_eq!(table.bound_field(knob(1)), Some(4));
        assert!(!table.is_armed(knob(1)));
        table.arm(knob(1));
        assert!(table.is_armed(knob(1)));
        assert_eq!(table.bound_field(knob(0)), None);
    }

    #[test]
    fn test_disarm_keeps_binding() {
        let mut table = KnobTable::new();
        table.bind(knob(2), 0);
        table.arm(knob(2));
        table.disarm_all();
        assert!(!table.is_armed(knob(2)));
        assert_eq!(table.bound_field(knob(2)), Some(0));
        table.clear();
        assert_eq!(table.bound_field(knob(2)), None);
    }

    #[test]
    fn test_settling_window() {
        let mut table = KnobTable::new();
        let t0 = Instant::now();
        let window = Duration::from_millis(500);
        assert!(!table.is_settling(knob(0), t0, window));
        table.touch(knob(0), t0);
        assert!(table.is_settling(knob(0), t0 + Duration::from_millis(499), window));
        assert!(table.is_settling(knob(0), t0 + Duration::from_millis(500), window));
        assert!(!table.is_settling(knob(0), t0 + Duration::from_millis(501), window));
    }
}
