//! Per-slot names and optional custom angles.

use crate::angle::{normalize_angle, position_to_angle};

const DEFAULT_NAMES: [&str; 5] = ["Luminance", "Red", "Green", "Blue", "H-Alpha"];

#[derive(Debug, Clone, Default, PartialEq)]
struct SlotEntry {
    name: Option<String>,
    angle: Option<f32>,
}

/// Names and angle overrides, indexed by slot (1-based).
///
/// Slots without an entry use the default name and the evenly spaced angle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTable {
    entries: Vec<SlotEntry>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, slot: u8) -> Option<&mut SlotEntry> {
        let idx = usize::from(slot.checked_sub(1)?);
        if self.entries.len() <= idx {
            self.entries.resize(idx + 1, SlotEntry::default());
        }
        self.entries.get_mut(idx)
    }

    fn entry(&self, slot: u8) -> Option<&SlotEntry> {
        self.entries.get(usize::from(slot.checked_sub(1)?))
    }

    pub fn set_name(&mut self, slot: u8, name: impl Into<String>) {
        if let Some(e) = self.entry_mut(slot) {
            e.name = Some(name.into());
        }
    }

    /// Override the target angle of `slot`; `None` restores even spacing.
    pub fn set_angle(&mut self, slot: u8, angle: Option<f32>) {
        if let Some(e) = self.entry_mut(slot) {
            e.angle = angle.map(normalize_angle);
        }
    }

    pub fn name(&self, slot: u8) -> String {
        if let Some(name) = self.entry(slot).and_then(|e| e.name.clone()) {
            return name;
        }
        match usize::from(slot).checked_sub(1).and_then(|i| DEFAULT_NAMES.get(i)) {
            Some(n) => (*n).to_string(),
            None => format!("Filter {slot}"),
        }
    }

    pub fn custom_angle(&self, slot: u8) -> Option<f32> {
        self.entry(slot).and_then(|e| e.angle)
    }

    /// Target angle for `slot`: the override if set, else even spacing.
    pub fn angle(&self, slot: u8, filter_count: u8) -> f32 {
        self.custom_angle(slot)
            .unwrap_or_else(|| position_to_angle(slot, filter_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_then_overrides() {
        let mut t = SlotTable::new();
        assert_eq!(t.name(1), "Luminance");
        assert_eq!(t.name(5), "H-Alpha");
        assert_eq!(t.name(7), "Filter 7");
        assert_eq!(t.angle(3, 5), 144.0);

        t.set_name(7, "OIII");
        t.set_angle(3, Some(150.5));
        assert_eq!(t.name(7), "OIII");
        assert_eq!(t.angle(3, 5), 150.5);
        t.set_angle(3, None);
        assert_eq!(t.angle(3, 5), 144.0);
    }

    #[test]
    fn slot_zero_is_ignored() {
        let mut t = SlotTable::new();
        t.set_name(0, "nope");
        assert_eq!(t.name(0), "Filter 0");
    }
}
