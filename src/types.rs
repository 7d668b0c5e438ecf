// Shared types module - Option lists and status values used across the form

use serde::Serialize;

// One entry of a select control: what the user sees and what gets stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabeledValue {
    pub label: &'static str,
    pub value: i64,
}

const fn lv(label: &'static str, value: i64) -> LabeledValue {
    LabeledValue { label, value }
}

pub const I2C_BLOCKS: &[LabeledValue] = &[
    lv("i2c0", 0),
    lv("i2c1", 1),
];

pub const ON_BOARD_LED_MODES: &[LabeledValue] = &[
    lv("Off", 0),
    lv("Mode Indicator", 1),
    lv("Input Test", 2),
];

pub const REVERSE_ACTIONS: &[LabeledValue] = &[
    lv("Disable", 0),
    lv("Enable", 1),
    lv("Neutral", 2),
];

// Only the ADC-capable GPIOs, plus "unassigned"
pub const ANALOG_PINS: &[LabeledValue] = &[
    lv("-1", -1),
    lv("26", 26),
    lv("27", 27),
    lv("28", 28),
];

pub const BUTTON_MASKS: &[LabeledValue] = &[
    lv("None", 0),
    lv("B1", 1 << 0),
    lv("B2", 1 << 1),
    lv("B3", 1 << 2),
    lv("B4", 1 << 3),
    lv("L1", 1 << 4),
    lv("R1", 1 << 5),
    lv("L2", 1 << 6),
    lv("R2", 1 << 7),
    lv("S1", 1 << 8),
    lv("S2", 1 << 9),
    lv("L3", 1 << 10),
    lv("R3", 1 << 11),
    lv("A1", 1 << 12),
    lv("A2", 1 << 13),
    lv("Up", 1 << 14),
    lv("Down", 1 << 15),
    lv("Left", 1 << 16),
    lv("Right", 1 << 17),
];

// GPIO range of the RP2040
pub const PIN_MIN: i64 = -1;
pub const PIN_MAX: i64 = 29;

// Outcome of the last submit, shown next to the save button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    Failed,
}

impl SaveStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SaveStatus::Saved => "Saved! Please Restart Your Device",
            SaveStatus::Failed => "Unable to Save",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success { SaveStatus::Saved } else { SaveStatus::Failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_masks_are_single_bits() {
        for mask in BUTTON_MASKS.iter().skip(1) {
            assert_eq!(mask.value.count_ones(), 1, "{} is not a single bit", mask.label);
        }
        assert_eq!(BUTTON_MASKS.last().map(|m| m.value), Some(1 << 17));
    }

    #[test]
    fn save_status_messages() {
        assert_eq!(SaveStatus::from_success(true).message(), "Saved! Please Restart Your Device");
        assert_eq!(SaveStatus::from_success(false).message(), "Unable to Save");
    }
}
