// Validation Module - Schema rules and pin conflict detection
//
// Everything here is a pure function of the current option values and the pins
// the device reports as used elsewhere, so a conflict shows up on both fields
// the moment the second one is set.
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::options::OptionSet;
use crate::schema::{FieldKind, FieldSpec, FIELDS};
use crate::types::{PIN_MAX, PIN_MIN};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{label} is a required field")]
    Required { label: &'static str },

    #[error("{label} must be a number (got `{value}`)")]
    NotANumber { label: &'static str, value: String },

    #[error("{label} must be greater than or equal to {min} (got {value})")]
    TooSmall { label: &'static str, min: i64, value: i64 },

    #[error("{label} must be less than or equal to {max} (got {value})")]
    TooLarge { label: &'static str, max: i64, value: i64 },

    #[error("{label} must be one of the following values: {allowed} (got {value})")]
    NotAllowed { label: &'static str, value: i64, allowed: String },

    #[error("{value} is already assigned!")]
    PinInUse { label: &'static str, value: i64 },

    #[error("{value} is already assigned to {other}!")]
    PinConflict { label: &'static str, value: i64, other: &'static str },

    #[error("{value} is unavailable/already assigned!")]
    AnalogPinUnavailable { label: &'static str, value: i64 },
}

/// Every failing field, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub BTreeMap<&'static str, FieldError>);

impl ValidationErrors {
    pub fn get(&self, name: &str) -> Option<&FieldError> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &FieldError)> {
        self.0.iter()
    }
}

pub fn validate(options: &OptionSet, used_pins: &[i64]) -> Result<(), ValidationErrors> {
    let errors: BTreeMap<_, _> = FIELDS
        .iter()
        .filter_map(|spec| {
            validate_field(spec, options, used_pins)
                .err()
                .map(|e| (spec.name, e))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

pub fn validate_field(
    spec: &FieldSpec,
    options: &OptionSet,
    used_pins: &[i64],
) -> Result<(), FieldError> {
    let label = spec.label;
    let value = match options.get(spec.name) {
        None | Some(Value::Null) => return Err(FieldError::Required { label }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(FieldError::Required { label })
        }
        Some(v) => v
            .as_i64()
            .ok_or_else(|| FieldError::NotANumber { label, value: display_raw(v) })?,
    };

    match spec.kind {
        FieldKind::EnableFlag | FieldKind::Number => Ok(()),
        FieldKind::Range { min, max } => check_bounds(label, value, min, max),
        FieldKind::Choice(allowed) => {
            if allowed.iter().any(|o| o.value == value) {
                Ok(())
            } else {
                Err(FieldError::NotAllowed {
                    label,
                    value,
                    allowed: allowed
                        .iter()
                        .map(|o| o.value.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
        FieldKind::Pin => {
            check_bounds(label, value, Some(PIN_MIN), Some(PIN_MAX))?;
            check_pin_free(spec, value, options, used_pins)
        }
        FieldKind::AnalogPin => {
            let offered = spec
                .kind
                .options()
                .map(|opts| opts.iter().any(|o| o.value == value))
                .unwrap_or(false);
            if !offered {
                return Err(FieldError::AnalogPinUnavailable { label, value });
            }
            check_pin_free(spec, value, options, used_pins)
        }
    }
}

fn check_bounds(
    label: &'static str,
    value: i64,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<(), FieldError> {
    if let Some(min) = min {
        if value < min {
            return Err(FieldError::TooSmall { label, min, value });
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(FieldError::TooLarge { label, max, value });
        }
    }
    Ok(())
}

fn check_pin_free(
    spec: &FieldSpec,
    value: i64,
    options: &OptionSet,
    used_pins: &[i64],
) -> Result<(), FieldError> {
    let label = spec.label;
    if value < 0 {
        return Ok(());
    }

    if used_pins.contains(&value) {
        return Err(match spec.kind {
            FieldKind::AnalogPin => FieldError::AnalogPinUnavailable { label, value },
            _ => FieldError::PinInUse { label, value },
        });
    }

    // Sibling conflicts only count between add-ons that are switched on
    if !options.is_enabled(spec.group) {
        return Ok(());
    }
    let clash = FIELDS.iter().find(|other| {
        other.name != spec.name
            && other.kind.is_pin()
            && options.is_enabled(other.group)
            && options.int(other.name) == Some(value)
    });
    match clash {
        Some(other) => Err(FieldError::PinConflict { label, value, other: other.label }),
        None => Ok(()),
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
