// Schema Module - Every add-on option the device exposes, grouped by add-on
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{
    LabeledValue, ANALOG_PINS, BUTTON_MASKS, I2C_BLOCKS, ON_BOARD_LED_MODES, REVERSE_ACTIONS,
};

/// An optional hardware feature with its own enable flag and panel on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddonGroup {
    BootselButton,
    OnBoardLed,
    Analog,
    Turbo,
    JSlider,
    Reverse,
    I2cAnalog1219,
    BuzzerSpeaker,
    CreditLeds,
    PcControl,
    Z680,
}

impl AddonGroup {
    /// Page order.
    pub const ALL: [AddonGroup; 11] = [
        AddonGroup::BootselButton,
        AddonGroup::OnBoardLed,
        AddonGroup::Analog,
        AddonGroup::Turbo,
        AddonGroup::JSlider,
        AddonGroup::Reverse,
        AddonGroup::I2cAnalog1219,
        AddonGroup::BuzzerSpeaker,
        AddonGroup::CreditLeds,
        AddonGroup::PcControl,
        AddonGroup::Z680,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AddonGroup::BootselButton => "BOOTSEL Button Configuration",
            AddonGroup::OnBoardLed => "On-Board LED Configuration",
            AddonGroup::Analog => "Analog",
            AddonGroup::Turbo => "Turbo",
            AddonGroup::JSlider => "Joystick Selection Slider",
            AddonGroup::Reverse => "Input Reverse",
            AddonGroup::I2cAnalog1219 => "I2C Analog ADS1219",
            AddonGroup::BuzzerSpeaker => "Buzzer Speaker",
            AddonGroup::CreditLeds => "Start Leds",
            AddonGroup::PcControl => "PC Control",
            AddonGroup::Z680 => "Z680",
        }
    }

    /// Name of the 0/1 option that switches this add-on on.
    pub fn enable_flag(&self) -> &'static str {
        match self {
            AddonGroup::BootselButton => "BootselButtonAddonEnabled",
            AddonGroup::OnBoardLed => "BoardLedAddonEnabled",
            AddonGroup::Analog => "AnalogInputEnabled",
            AddonGroup::Turbo => "TurboInputEnabled",
            AddonGroup::JSlider => "JSliderInputEnabled",
            AddonGroup::Reverse => "ReverseInputEnabled",
            AddonGroup::I2cAnalog1219 => "I2CAnalog1219InputEnabled",
            AddonGroup::BuzzerSpeaker => "BuzzerSpeakerAddonEnabled",
            AddonGroup::CreditLeds => "creditledsAddonEnabled",
            AddonGroup::PcControl => "pcControlAddonEnabled",
            AddonGroup::Z680 => "z680AddonEnabled",
        }
    }

    /// Extra text shown above the fields, if any.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            AddonGroup::BootselButton => {
                Some("Note: OLED might become unresponsive if button is set, unset to restore.")
            }
            AddonGroup::Analog => Some("Available pins: -1, 26, 27, 28"),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        FIELDS.iter().filter(move |f| f.group == *self && !f.is_enable_flag())
    }
}

impl fmt::Display for AddonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for AddonGroup {
    type Err = anyhow::Error;

    // Accepts the group name ("turbo") or its enable flag ("TurboInputEnabled")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AddonGroup::ALL
            .iter()
            .copied()
            .find(|g| {
                g.to_string().eq_ignore_ascii_case(wanted)
                    || g.enable_flag().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| anyhow::anyhow!("Unknown add-on group: {}", wanted))
    }
}

/// What kind of value an option holds and which rules apply to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// GPIO in [-1, 29], unique among enabled add-ons and not used elsewhere.
    Pin,
    /// GPIO restricted to the ADC-capable list, same uniqueness rules as `Pin`.
    AnalogPin,
    /// Add-on enable switch.
    EnableFlag,
    /// One of a fixed label/value list.
    Choice(&'static [LabeledValue]),
    /// Inclusive bounds; `None` leaves that side open.
    Range { min: Option<i64>, max: Option<i64> },
    /// Required number without bounds.
    Number,
}

impl FieldKind {
    pub fn is_pin(&self) -> bool {
        matches!(self, FieldKind::Pin | FieldKind::AnalogPin)
    }

    pub fn options(&self) -> Option<&'static [LabeledValue]> {
        match self {
            FieldKind::Choice(options) => Some(options),
            FieldKind::AnalogPin => Some(ANALOG_PINS),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub group: AddonGroup,
    pub kind: FieldKind,
    pub default: i64,
    // Text shown on the page when it differs from the label used in errors
    pub caption: Option<&'static str>,
}

impl FieldSpec {
    pub fn is_enable_flag(&self) -> bool {
        self.kind == FieldKind::EnableFlag
    }

    pub fn display_label(&self) -> &'static str {
        match self.caption {
            Some(caption) => caption,
            None => self.label,
        }
    }

    const fn captioned(self, caption: &'static str) -> FieldSpec {
        FieldSpec { caption: Some(caption), ..self }
    }
}

const fn pin(name: &'static str, label: &'static str, group: AddonGroup) -> FieldSpec {
    FieldSpec { name, label, group, kind: FieldKind::Pin, default: -1, caption: None }
}

const fn flag(name: &'static str, label: &'static str, group: AddonGroup) -> FieldSpec {
    FieldSpec { name, label, group, kind: FieldKind::EnableFlag, default: 0, caption: None }
}

const fn choice(
    name: &'static str,
    label: &'static str,
    group: AddonGroup,
    options: &'static [LabeledValue],
    default: i64,
) -> FieldSpec {
    FieldSpec { name, label, group, kind: FieldKind::Choice(options), default, caption: None }
}

const fn range(
    name: &'static str,
    label: &'static str,
    group: AddonGroup,
    min: Option<i64>,
    max: Option<i64>,
    default: i64,
) -> FieldSpec {
    FieldSpec { name, label, group, kind: FieldKind::Range { min, max }, default, caption: None }
}

use AddonGroup::*;

pub static FIELDS: &[FieldSpec] = &[
    flag("BootselButtonAddonEnabled", "Boot Select Button Add-On Enabled", BootselButton),
    choice("bootselButtonMap", "BOOTSEL Button Map", BootselButton, BUTTON_MASKS, 0),

    flag("BoardLedAddonEnabled", "Board LED Add-On Enabled", OnBoardLed),
    choice("onBoardLedMode", "On-Board LED Mode", OnBoardLed, ON_BOARD_LED_MODES, 0),

    flag("AnalogInputEnabled", "Analog Input Enabled", Analog),
    FieldSpec { name: "analogAdcPinX", label: "Analog Stick Pin X", group: Analog, kind: FieldKind::AnalogPin, default: -1, caption: None },
    FieldSpec { name: "analogAdcPinY", label: "Analog Stick Pin Y", group: Analog, kind: FieldKind::AnalogPin, default: -1, caption: None },

    flag("TurboInputEnabled", "Turbo Input Enabled", Turbo),
    pin("turboPin", "Turbo Pin", Turbo),
    pin("turboPinLED", "Turbo Pin LED", Turbo),
    range("turboShotCount", "Turbo Shot Count", Turbo, Some(5), Some(30), 5),

    flag("JSliderInputEnabled", "JSlider Input Enabled", JSlider),
    pin("sliderLSPin", "Slider LS Pin", JSlider),
    pin("sliderRSPin", "Slider RS Pin", JSlider),

    flag("ReverseInputEnabled", "Reverse Input Enabled", Reverse),
    pin("reversePin", "Reverse Pin", Reverse).captioned("Reverse Input Pin"),
    pin("reversePinLED", "Reverse Pin LED", Reverse).captioned("Reverse Input Pin LED"),
    choice("reverseActionUp", "Reverse Up", Reverse, REVERSE_ACTIONS, 1),
    choice("reverseActionDown", "Reverse Down", Reverse, REVERSE_ACTIONS, 1),
    choice("reverseActionLeft", "Reverse Left", Reverse, REVERSE_ACTIONS, 1),
    choice("reverseActionRight", "Reverse Right", Reverse, REVERSE_ACTIONS, 1),

    flag("I2CAnalog1219InputEnabled", "I2C Analog1219 Input Enabled", I2cAnalog1219),
    pin("i2cAnalog1219SDAPin", "I2C Analog1219 SDA Pin", I2cAnalog1219),
    pin("i2cAnalog1219SCLPin", "I2C Analog1219 SCL Pin", I2cAnalog1219),
    choice("i2cAnalog1219Block", "I2C Analog1219 Block", I2cAnalog1219, I2C_BLOCKS, 0),
    range("i2cAnalog1219Speed", "I2C Analog1219 Speed", I2cAnalog1219, Some(100_000), None, 400_000),
    FieldSpec { name: "i2cAnalog1219Address", label: "I2C Analog1219 Address", group: I2cAnalog1219, kind: FieldKind::Number, default: 0x40, caption: None },

    flag("BuzzerSpeakerAddonEnabled", "Buzzer Speaker Add-On Enabled", BuzzerSpeaker),
    pin("buzzerPin", "Buzzer Pin", BuzzerSpeaker),
    range("buzzerVolume", "Buzzer Volume", BuzzerSpeaker, Some(0), Some(100), 100),

    flag("creditledsAddonEnabled", "Start LEDs Add-On Enabled", CreditLeds),
    pin("creditledsStartPin1", "Start button LED Pin Player 1", CreditLeds),
    pin("creditledsStartPin2", "Start button LED Pin Player 2", CreditLeds),
    pin("creditledsCoinPin1", "Coin button LED Pin Player 1", CreditLeds),
    pin("creditledsCoinPin2", "Coin button LED Pin Player 2", CreditLeds),
    pin("creditledsMarqueePin", "Marquee LED Pin", CreditLeds),
    range("creditledsStartBrightness", "Start LED Brightness", CreditLeds, Some(0), Some(100), 100),
    range("creditledsCoinBrightness", "Coin LED Brightness", CreditLeds, Some(0), Some(100), 100),
    range("creditledsMarqueeBrightness", "Marquee LED Brightness", CreditLeds, Some(0), Some(100), 100),
    pin("creditledsExtStartPin", "External Start Button Pin", CreditLeds),
    pin("creditledsExtCoinPin", "External Coin Button Pin", CreditLeds),

    flag("pcControlAddonEnabled", "PC Control Add-On Enabled", PcControl),
    pin("pcControlPowerPin", "PC Control Power Pin", PcControl),
    pin("pcControlPowerSwitchPin", "PC Control Power Switch Pin", PcControl),

    flag("z680AddonEnabled", "Z680 Add-On Enabled", Z680),
    pin("z680PowerPin", "Z680 Power Pin", Z680),
    pin("z680PowerStatePin", "Z680 Power State Pin", Z680),
    pin("z680MutePin", "Z680 Mute Pin", Z680),
    pin("z680VolumeUpPin", "Z680 Volume Up Pin", Z680),
    pin("z680VolumeDownPin", "Z680 Volume Down Pin", Z680),
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique() {
        let mut seen = HashSet::new();
        for f in FIELDS {
            assert!(seen.insert(f.name), "duplicate field {}", f.name);
        }
    }

    #[test]
    fn every_group_has_exactly_one_enable_flag() {
        for group in AddonGroup::ALL {
            let flags: Vec<_> = FIELDS
                .iter()
                .filter(|f| f.group == group && f.is_enable_flag())
                .collect();
            assert_eq!(flags.len(), 1, "{}", group);
            assert_eq!(flags[0].name, group.enable_flag());
        }
    }

    #[test]
    fn choice_defaults_are_members_of_their_lists() {
        for f in FIELDS {
            if let Some(options) = f.kind.options() {
                assert!(options.iter().any(|o| o.value == f.default), "{}", f.name);
            }
        }
    }

    #[test]
    fn group_parses_from_name_or_flag() {
        assert_eq!("turbo".parse::<AddonGroup>().unwrap(), AddonGroup::Turbo);
        assert_eq!("TurboInputEnabled".parse::<AddonGroup>().unwrap(), AddonGroup::Turbo);
        assert_eq!("z680AddonEnabled".parse::<AddonGroup>().unwrap(), AddonGroup::Z680);
        assert!("nonsense".parse::<AddonGroup>().is_err());
    }

    #[test]
    fn group_fields_skip_the_flag() {
        let names: Vec<_> = AddonGroup::BuzzerSpeaker.fields().map(|f| f.name).collect();
        assert_eq!(names, vec!["buzzerPin", "buzzerVolume"]);
    }

    #[test]
    fn reverse_pins_show_their_page_caption() {
        let pin = field("reversePin").unwrap();
        assert_eq!(pin.label, "Reverse Pin");
        assert_eq!(pin.display_label(), "Reverse Input Pin");
        assert_eq!(field("reversePinLED").unwrap().display_label(), "Reverse Input Pin LED");
        assert_eq!(field("turboPin").unwrap().display_label(), "Turbo Pin");
    }
}
