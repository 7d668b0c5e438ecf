// Form Module - The add-on configuration form: load, edit, validate, submit
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::options::{AddonsSnapshot, OptionSet};
use crate::schema::{AddonGroup, FieldKind, FieldSpec};
use crate::source::{ConfigSource, SourceError};
use crate::types::{LabeledValue, SaveStatus, PIN_MAX, PIN_MIN};
use crate::validate::{self, FieldError, ValidationErrors};

pub const FORM_TITLE: &str = "Add-Ons Configuration";
pub const FORM_INTRO: &str = "Use the form below to reconfigure add-on options in GP2040-CE.";

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation failed, nothing was sent.
    Blocked(ValidationErrors),
    Saved,
    Failed,
}

#[derive(Debug, Default)]
pub struct AddonConfigForm {
    options: OptionSet,
    used_pins: Vec<i64>,
    errors: ValidationErrors,
    status: Option<SaveStatus>,
    load_failed: bool,
}

impl AddonConfigForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// One read from the device. On failure the form falls back to defaults.
    pub async fn mount(&mut self, source: &dyn ConfigSource) -> bool {
        let loaded = source.load().await;
        self.apply_load(loaded)
    }

    /// Take the result of a device read. A failed read discards whatever was
    /// loaded or edited before.
    pub fn apply_load(&mut self, loaded: Result<AddonsSnapshot, SourceError>) -> bool {
        match loaded {
            Ok(snapshot) => {
                info!(
                    fields = snapshot.options.len(),
                    used_pins = ?snapshot.used_pins,
                    "loaded add-on options"
                );
                self.used_pins = snapshot.used_pins;
                self.options.hydrate(snapshot.options);
                self.options.coerce();
                self.load_failed = false;
            }
            Err(e) => {
                warn!("failed to load add-on options, using defaults: {}", e);
                self.options = OptionSet::default();
                self.used_pins.clear();
                self.load_failed = true;
            }
        }
        self.revalidate();
        !self.load_failed
    }

    /// Apply one edited value. Coercion runs over the whole set, then every
    /// field is re-checked so conflicts appear (and clear) on both sides.
    pub fn change(&mut self, name: &str, value: Value) -> Option<&FieldError> {
        self.options.set(name, value);
        self.options.coerce();
        self.revalidate();
        self.errors.get(name)
    }

    pub fn toggle(&mut self, group: AddonGroup) -> bool {
        let enabled = self.options.toggle(group);
        self.revalidate();
        enabled
    }

    pub async fn submit(&mut self, source: &dyn ConfigSource) -> SubmitOutcome {
        let payload = match self.prepare_submit() {
            Ok(payload) => payload,
            Err(errors) => return SubmitOutcome::Blocked(errors),
        };
        let saved = source.save(&payload).await;
        self.finish_submit(saved)
    }

    /// Coerce and validate. Returns the payload to write, or what blocks it.
    pub fn prepare_submit(&mut self) -> Result<Map<String, Value>, ValidationErrors> {
        self.options.coerce();
        if let Err(errors) = validate::validate(&self.options, &self.used_pins) {
            warn!("submit blocked: {}", errors);
            self.errors = errors.clone();
            return Err(errors);
        }
        self.errors = ValidationErrors::default();
        Ok(self.options.to_payload())
    }

    /// Record the device's answer to a write started by `prepare_submit`.
    pub fn finish_submit(&mut self, saved: Result<bool, SourceError>) -> SubmitOutcome {
        let success = match saved {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("failed to save add-on options: {}", e);
                false
            }
        };

        let status = SaveStatus::from_success(success);
        info!(?status, "submit finished");
        self.status = Some(status);
        if success { SubmitOutcome::Saved } else { SubmitOutcome::Failed }
    }

    fn revalidate(&mut self) {
        self.errors = validate::validate(&self.options, &self.used_pins)
            .err()
            .unwrap_or_default();
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn used_pins(&self) -> &[i64] {
        &self.used_pins
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.status.map(|s| s.message())
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn view(&self) -> FormView {
        FormView {
            title: FORM_TITLE,
            intro: FORM_INTRO,
            sections: AddonGroup::ALL
                .iter()
                .map(|group| self.section_view(*group))
                .collect(),
            status: self.status_message(),
            load_failed: self.load_failed,
            valid: self.errors.is_empty(),
            used_pins: self.used_pins.clone(),
        }
    }

    fn section_view(&self, group: AddonGroup) -> SectionView {
        SectionView {
            group,
            title: group.title(),
            note: group.note(),
            enable_flag: group.enable_flag(),
            enabled: self.options.is_enabled(group),
            fields: group.fields().map(|spec| self.field_view(spec)).collect(),
        }
    }

    fn field_view(&self, spec: &FieldSpec) -> FieldView {
        let (min, max) = match spec.kind {
            FieldKind::Pin => (Some(PIN_MIN), Some(PIN_MAX)),
            FieldKind::Range { min, max } => (min, max),
            _ => (None, None),
        };
        FieldView {
            name: spec.name,
            label: spec.display_label(),
            control: if spec.kind.options().is_some() { "select" } else { "number" },
            value: self.options.get(spec.name).cloned().unwrap_or(Value::Null),
            error: self.errors.get(spec.name).map(|e| e.to_string()),
            options: spec.kind.options(),
            min,
            max,
        }
    }
}

/// Everything the page needs to draw the form.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub title: &'static str,
    pub intro: &'static str,
    pub sections: Vec<SectionView>,
    pub status: Option<&'static str>,
    pub load_failed: bool,
    pub valid: bool,
    pub used_pins: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub group: AddonGroup,
    pub title: &'static str,
    pub note: Option<&'static str>,
    pub enable_flag: &'static str,
    pub enabled: bool,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub control: &'static str,
    pub value: Value,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'static [LabeledValue]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;
    use serde_json::json;

    fn defaults_with_used(used: Value) -> Value {
        let mut data = OptionSet::default().to_payload();
        data.insert("usedPins".to_string(), used);
        Value::Object(data)
    }

    #[tokio::test]
    async fn double_assigned_pin_blocks_unchanged_submit() {
        let mut data = OptionSet::default().to_payload();
        for (k, v) in [
            ("turboPin", json!(5)),
            ("buzzerPin", json!(5)),
            ("TurboInputEnabled", json!(1)),
            ("BuzzerSpeakerAddonEnabled", json!(1)),
            ("usedPins", json!([])),
        ] {
            data.insert(k.to_string(), v);
        }
        let source = MemorySource::with_json(Value::Object(data));
        let mut form = AddonConfigForm::new();
        assert!(form.mount(&source).await);

        match form.submit(&source).await {
            SubmitOutcome::Blocked(errors) => {
                assert!(errors.get("turboPin").is_some());
                assert!(errors.get("buzzerPin").is_some());
            }
            other => panic!("expected blocked submit, got {:?}", other),
        }
        assert!(source.saves().is_empty());
        assert_eq!(form.status_message(), None);
    }

    #[tokio::test]
    async fn used_pin_from_device_blocks_turbo_pin() {
        let source = MemorySource::with_json(defaults_with_used(json!([10])));
        let mut form = AddonConfigForm::new();
        form.mount(&source).await;
        assert_eq!(form.used_pins(), &[10]);

        form.toggle(AddonGroup::Turbo);
        assert_eq!(
            form.change("turboPin", json!("10")).map(|e| e.to_string()),
            Some("10 is already assigned!".to_string())
        );
        assert!(matches!(form.submit(&source).await, SubmitOutcome::Blocked(_)));

        assert_eq!(form.change("turboPin", json!("11")), None);
        assert_eq!(form.submit(&source).await, SubmitOutcome::Saved);
        assert_eq!(form.options().int("turboPin"), Some(11));
    }

    #[tokio::test]
    async fn save_result_sets_status_message() {
        let source = MemorySource::with_json(defaults_with_used(json!([])));
        let mut form = AddonConfigForm::new();
        form.mount(&source).await;
        assert_eq!(form.submit(&source).await, SubmitOutcome::Saved);
        assert_eq!(form.status_message(), Some("Saved! Please Restart Your Device"));

        let refusing = MemorySource { accept_saves: false, ..MemorySource::with_json(defaults_with_used(json!([]))) };
        let mut form = AddonConfigForm::new();
        form.mount(&refusing).await;
        assert_eq!(form.submit(&refusing).await, SubmitOutcome::Failed);
        assert_eq!(form.status_message(), Some("Unable to Save"));
    }

    #[tokio::test]
    async fn failed_load_keeps_defaults() {
        let source = MemorySource::unreachable();
        let mut form = AddonConfigForm::new();
        assert!(!form.mount(&source).await);
        assert!(form.load_failed());
        assert_eq!(form.options(), &OptionSet::default());
        assert!(form.errors().is_empty());
    }

    #[tokio::test]
    async fn failed_reload_drops_previously_loaded_values() {
        let mut data = OptionSet::default().to_payload();
        data.insert("turboPin".to_string(), json!(12));
        data.insert("usedPins".to_string(), json!([3]));
        let source = MemorySource::with_json(Value::Object(data));
        let mut form = AddonConfigForm::new();
        assert!(form.mount(&source).await);
        form.change("buzzerPin", json!("8"));
        assert_eq!(form.options().int("turboPin"), Some(12));

        assert!(!form.mount(&MemorySource::unreachable()).await);
        assert!(form.load_failed());
        assert_eq!(form.options(), &OptionSet::default());
        assert!(form.used_pins().is_empty());

        assert!(form.mount(&source).await);
        assert!(!form.load_failed());
        assert_eq!(form.options().int("turboPin"), Some(12));
    }

    #[tokio::test]
    async fn submit_sends_the_whole_set_including_hidden_fields() {
        let mut data = OptionSet::default().to_payload();
        data.insert("usedPins".to_string(), json!([2]));
        data.insert("somethingNew".to_string(), json!(7));
        let source = MemorySource::with_json(Value::Object(data));
        let mut form = AddonConfigForm::new();
        form.mount(&source).await;

        // Z680 stays disabled but its pin is still submitted
        form.change("z680MutePin", json!("4"));
        assert_eq!(form.submit(&source).await, SubmitOutcome::Saved);

        let saves = source.saves();
        assert_eq!(saves.len(), 1);
        let sent = &saves[0];
        assert_eq!(sent.get("z680MutePin"), Some(&json!(4)));
        assert_eq!(sent.get("somethingNew"), Some(&json!(7)));
        assert!(!sent.contains_key("usedPins"));
        for spec in crate::schema::FIELDS {
            assert!(sent.contains_key(spec.name), "{} missing from submit", spec.name);
        }
    }

    #[tokio::test]
    async fn conflict_clears_when_the_other_field_moves() {
        let source = MemorySource::with_json(defaults_with_used(json!([])));
        let mut form = AddonConfigForm::new();
        form.mount(&source).await;
        form.toggle(AddonGroup::Turbo);
        form.toggle(AddonGroup::Reverse);

        form.change("turboPin", json!("6"));
        assert!(form.change("reversePin", json!("6")).is_some());
        assert!(form.errors().get("turboPin").is_some());

        form.change("reversePin", json!("7"));
        assert!(form.errors().is_empty());
    }

    #[test]
    fn view_lists_every_group_with_its_fields() {
        let mut form = AddonConfigForm::new();
        form.toggle(AddonGroup::OnBoardLed);
        let view = form.view();

        assert_eq!(view.sections.len(), AddonGroup::ALL.len());
        let led = &view.sections[1];
        assert_eq!(led.title, "On-Board LED Configuration");
        assert!(led.enabled);
        assert_eq!(led.fields[0].name, "onBoardLedMode");
        assert_eq!(led.fields[0].control, "select");
        assert_eq!(led.fields[0].options.map(|o| o.len()), Some(3));

        let turbo = view.sections.iter().find(|s| s.group == AddonGroup::Turbo).unwrap();
        assert!(!turbo.enabled);
        let pin = &turbo.fields[0];
        assert_eq!((pin.name, pin.min, pin.max), ("turboPin", Some(-1), Some(29)));
        assert_eq!(pin.value, json!(-1));
        assert!(view.valid);

        let reverse = view.sections.iter().find(|s| s.group == AddonGroup::Reverse).unwrap();
        let labels: Vec<_> = reverse.fields.iter().take(2).map(|f| f.label).collect();
        assert_eq!(labels, vec!["Reverse Input Pin", "Reverse Input Pin LED"]);
    }
}
