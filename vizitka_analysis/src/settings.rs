// Analyzer settings.
//
// Settings are a flat name → JSON value map. Each analyzer publishes a list
// of `SettingSpec`s naming every option it recognises, its type, and its
// default. Before an analyzer runs, the chain resolver merges the defaults
// under the caller's settings and validates the result against that list,
// so `run` implementations can read settings with the typed getters and
// treat a getter error as a bug in the analyzer rather than user input.
//
// The map is a `BTreeMap`, so `canonical()` always produces the same JSON
// text for equal settings regardless of insertion order. Cache keys rely
// on this.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, JsonValue>);

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Builder form of `set`.
    pub fn with(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<JsonValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` layered over `base`: keys in `self` win.
    pub fn merged_over(&self, base: &Settings) -> Settings {
        let mut merged = base.clone();
        for (k, v) in &self.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Canonical JSON text, keys sorted.
    pub fn canonical(&self) -> String {
        let object: serde_json::Map<String, JsonValue> =
            self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        JsonValue::Object(object).to_string()
    }

    /// Reject unknown names, wrongly-typed values, and missing required
    /// settings.
    pub fn validate(&self, analyzer: &str, specs: &[SettingSpec]) -> Result<()> {
        for name in self.0.keys() {
            if !specs.iter().any(|s| s.name == name) {
                return Err(AnalysisError::UnknownSetting {
                    analyzer: analyzer.to_string(),
                    setting: name.clone(),
                    possible: specs.iter().map(|s| s.name).collect::<Vec<_>>().join(", "),
                });
            }
        }
        for spec in specs {
            match self.0.get(spec.name) {
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(AnalysisError::InvalidSetting {
                        analyzer: analyzer.to_string(),
                        setting: spec.name.to_string(),
                        expected: spec.kind.describe(),
                        found: value.to_string(),
                    });
                }
                None if matches!(spec.default, SettingDefault::Required) => {
                    return Err(missing(analyzer, spec.name));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn require(&self, analyzer: &str, name: &str) -> Result<&JsonValue> {
        self.0.get(name).ok_or_else(|| missing(analyzer, name))
    }

    pub fn bool(&self, analyzer: &str, name: &str) -> Result<bool> {
        let value = self.require(analyzer, name)?;
        value
            .as_bool()
            .ok_or_else(|| invalid(analyzer, name, "a boolean", value))
    }

    pub fn unsigned(&self, analyzer: &str, name: &str) -> Result<u64> {
        let value = self.require(analyzer, name)?;
        value
            .as_u64()
            .ok_or_else(|| invalid(analyzer, name, "a non-negative integer", value))
    }

    pub fn text(&self, analyzer: &str, name: &str) -> Result<&str> {
        let value = self.require(analyzer, name)?;
        value
            .as_str()
            .ok_or_else(|| invalid(analyzer, name, "a string", value))
    }

    pub fn text_list(&self, analyzer: &str, name: &str) -> Result<Vec<String>> {
        let value = self.require(analyzer, name)?;
        string_list(value).ok_or_else(|| invalid(analyzer, name, "a list of strings", value))
    }

    /// `"all"` → `None`; a list of strings → `Some(list)`.
    pub fn selection(&self, analyzer: &str, name: &str) -> Result<Option<Vec<String>>> {
        let value = self.require(analyzer, name)?;
        if value.as_str() == Some("all") {
            return Ok(None);
        }
        string_list(value)
            .map(Some)
            .ok_or_else(|| invalid(analyzer, name, "\"all\" or a list of strings", value))
    }
}

fn string_list(value: &JsonValue) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn missing(analyzer: &str, name: &str) -> AnalysisError {
    AnalysisError::MissingSetting {
        analyzer: analyzer.to_string(),
        setting: name.to_string(),
    }
}

fn invalid(analyzer: &str, name: &str, expected: &str, found: &JsonValue) -> AnalysisError {
    AnalysisError::InvalidSetting {
        analyzer: analyzer.to_string(),
        setting: name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// The accepted shape of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Unsigned,
    /// An integer no smaller than the bound.
    AtLeast(u64),
    Text,
    /// One of a fixed set of strings.
    Choice(&'static [&'static str]),
    TextList,
    /// `"all"` or a list of strings.
    AllOrTextList,
}

impl SettingKind {
    pub fn accepts(self, value: &JsonValue) -> bool {
        match self {
            SettingKind::Bool => value.is_boolean(),
            SettingKind::Unsigned => value.is_u64(),
            SettingKind::AtLeast(min) => value.as_u64().is_some_and(|n| n >= min),
            SettingKind::Text => value.is_string(),
            SettingKind::Choice(options) => value.as_str().is_some_and(|s| options.contains(&s)),
            SettingKind::TextList => string_list(value).is_some(),
            SettingKind::AllOrTextList => {
                value.as_str() == Some("all") || string_list(value).is_some()
            }
        }
    }

    pub fn describe(self) -> String {
        match self {
            SettingKind::Bool => "a boolean".to_string(),
            SettingKind::Unsigned => "a non-negative integer".to_string(),
            SettingKind::AtLeast(min) => format!("an integer of at least {min}"),
            SettingKind::Text => "a string".to_string(),
            SettingKind::Choice(options) => format!("one of {}", options.join(", ")),
            SettingKind::TextList => "a list of strings".to_string(),
            SettingKind::AllOrTextList => "\"all\" or a list of strings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingDefault {
    Required,
    Bool(bool),
    Unsigned(u64),
    Text(&'static str),
    TextList(&'static [&'static str]),
}

impl SettingDefault {
    fn to_json(self) -> Option<JsonValue> {
        match self {
            SettingDefault::Required => None,
            SettingDefault::Bool(b) => Some(JsonValue::Bool(b)),
            SettingDefault::Unsigned(n) => Some(JsonValue::from(n)),
            SettingDefault::Text(s) => Some(JsonValue::from(s)),
            SettingDefault::TextList(list) => Some(JsonValue::from(list.to_vec())),
        }
    }
}

/// One recognised analyzer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSpec {
    pub name: &'static str,
    pub kind: SettingKind,
    pub default: SettingDefault,
}

impl SettingSpec {
    pub const fn new(name: &'static str, kind: SettingKind, default: SettingDefault) -> Self {
        SettingSpec {
            name,
            kind,
            default,
        }
    }

    pub const fn required(name: &'static str, kind: SettingKind) -> Self {
        SettingSpec::new(name, kind, SettingDefault::Required)
    }
}

/// Settings holding every non-required default from `specs`.
pub fn defaults_of(specs: &[SettingSpec]) -> Settings {
    let mut settings = Settings::new();
    for spec in specs {
        if let Some(value) = spec.default.to_json() {
            settings.0.insert(spec.name.to_string(), value);
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_SETTINGS: &[SettingSpec] = &[
        SettingSpec::required("n", SettingKind::Unsigned),
        SettingSpec::new("quality", SettingKind::Bool, SettingDefault::Bool(true)),
        SettingSpec::new(
            "mode",
            SettingKind::Choice(&["simple", "compound"]),
            SettingDefault::Text("compound"),
        ),
        SettingSpec::new("vertical", SettingKind::AllOrTextList, SettingDefault::Text("all")),
    ];

    #[test]
    fn canonical_is_order_independent() {
        let a = Settings::new().with("b", 1).with("a", json!({"z": 1, "y": 2}));
        let b = Settings::new().with("a", json!({"y": 2, "z": 1})).with("b", 1);
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn defaults_merge_under_explicit_values() {
        let defaults = defaults_of(TEST_SETTINGS);
        assert!(!defaults.contains("n"));
        let merged = Settings::new().with("n", 2).with("quality", false).merged_over(&defaults);
        assert!(!merged.bool("t", "quality").unwrap());
        assert_eq!(merged.text("t", "mode").unwrap(), "compound");
        assert_eq!(merged.unsigned("t", "n").unwrap(), 2);
        assert_eq!(merged.selection("t", "vertical").unwrap(), None);
        merged.validate("t", TEST_SETTINGS).unwrap();
    }

    #[test]
    fn validate_reports_each_problem() {
        let defaults = defaults_of(TEST_SETTINGS);
        let missing = defaults.clone();
        assert!(matches!(
            missing.validate("t", TEST_SETTINGS),
            Err(AnalysisError::MissingSetting { .. })
        ));
        let wrong = Settings::new().with("n", "two").merged_over(&defaults);
        assert!(matches!(
            wrong.validate("t", TEST_SETTINGS),
            Err(AnalysisError::InvalidSetting { .. })
        ));
        let bad_choice = Settings::new().with("n", 1).with("mode", "both").merged_over(&defaults);
        assert!(matches!(
            bad_choice.validate("t", TEST_SETTINGS),
            Err(AnalysisError::InvalidSetting { .. })
        ));
        let unknown = Settings::new().with("n", 1).with("colour", "red").merged_over(&defaults);
        assert!(matches!(
            unknown.validate("t", TEST_SETTINGS),
            Err(AnalysisError::UnknownSetting { .. })
        ));
    }

    #[test]
    fn lower_bound_rejects_smaller_integers() {
        let spec = &[SettingSpec::required("n", SettingKind::AtLeast(1))];
        Settings::new().with("n", 1).validate("t", spec).unwrap();
        assert!(matches!(
            Settings::new().with("n", 0).validate("t", spec),
            Err(AnalysisError::InvalidSetting { .. })
        ));
        assert!(matches!(
            Settings::new().with("n", -2).validate("t", spec),
            Err(AnalysisError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn selection_accepts_list() {
        let s = Settings::new().with("vertical", json!(["0,1", "0,2"]));
        assert_eq!(
            s.selection("t", "vertical").unwrap(),
            Some(vec!["0,1".to_string(), "0,2".to_string()])
        );
    }
}
