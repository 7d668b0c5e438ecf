// Options Module - The in-memory option set edited by the form
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::schema::{AddonGroup, FIELDS};

/// What the device returns from its read endpoint: every option plus the pins
/// claimed by the rest of its configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonsSnapshot {
    #[serde(rename = "usedPins", default)]
    pub used_pins: Vec<i64>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Name -> value map holding every option, including ones the schema does not
/// know about (they are submitted back untouched).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    values: Map<String, Value>,
}

impl Default for OptionSet {
    fn default() -> Self {
        let values = FIELDS
            .iter()
            .map(|f| (f.name.to_string(), Value::from(f.default)))
            .collect();
        OptionSet { values }
    }
}

impl OptionSet {
    /// Replace every value with what the device sent.
    pub fn hydrate(&mut self, mut options: Map<String, Value>) {
        options.remove("usedPins");
        self.values = options;
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Integer value of an option, if it currently holds one.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Mirrors how the page decides visibility: any non-zero flag shows the group.
    pub fn is_enabled(&self, group: AddonGroup) -> bool {
        match self.values.get(group.enable_flag()) {
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
            Some(Value::String(s)) => parse_int(s).map(|v| v != 0).unwrap_or(!s.is_empty()),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Flip an add-on's enable flag. Only an exact 1 switches off.
    pub fn toggle(&mut self, group: AddonGroup) -> bool {
        let next = if self.int(group.enable_flag()) == Some(1) { 0 } else { 1 };
        self.set(group.enable_flag(), Value::from(next));
        next == 1
    }

    /// Turn every string/float value into an integer where it parses. Unset
    /// values stay unset and anything unparsable stays as-is for validation to
    /// report.
    pub fn coerce(&mut self) {
        for value in self.values.values_mut() {
            if let Some(coerced) = coerce_value(value) {
                *value = coerced;
            }
        }
    }

    /// The complete object sent on submit.
    pub fn to_payload(&self) -> Map<String, Value> {
        self.values.clone()
    }
}

fn coerce_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Number(n) if n.is_i64() => None,
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| Value::Number(Number::from(f.trunc() as i64))),
        Value::String(s) => parse_int(s).map(Value::from),
        _ => None,
    }
}

/// Leading-integer parse: surrounding whitespace and trailing garbage are
/// ignored ("  12px" -> 12), a `0x` prefix reads hex ("0x40" -> 64), no
/// leading digits -> None.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, rest) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let digits_end = rest
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let magnitude = i64::from_str_radix(&rest[..digits_end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
