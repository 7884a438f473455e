//! Structured state document for plugin save/load
//!
//! The persisted document is a three-section tree: the plugin's parameter
//! values, the MIDI settings (devices, channel gate, automation bindings),
//! and an opaque custom subtree owned by the plugin's engine.
//!
//! Backward compatibility: older hosts persisted just the bare params tree
//! with no section wrapper. If the top level of a loaded document has none
//! of the known section keys, the whole document is treated as a legacy
//! params tree and the other sections default to empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameter values keyed by descriptor id.
pub type ParamsState = BTreeMap<String, f32>;

/// Plugin-owned custom subtree. `Null` when the plugin has none.
pub type CustomState = serde_yaml::Value;

/// MIDI message type an automation binding listens for / emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationKind {
    Cc,
    Note,
    Pressure,
}

/// One persisted automation binding.
///
/// `param` is signed so that half-captured learn entries (which the original
/// host persisted as `-1`) can be recognized and dropped on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationRecord {
    pub param: i64,
    pub channel: u8,
    pub num: u8,
    pub kind: AutomationKind,
    pub scale: f32,
    pub offset: f32,
}

/// Persisted MIDI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiState {
    /// Input port name, empty for none
    pub input_device: String,
    /// Output port name, empty for none
    pub output_device: String,
    /// Channel gate: 0 accepts every channel, 1-16 accepts only that channel
    pub channel: u8,
    /// Forward gated Note On/Off to the plugin as note events
    pub note_input: bool,
    pub automation: Vec<AutomationRecord>,
}

impl Default for MidiState {
    fn default() -> Self {
        Self {
            input_device: String::new(),
            output_device: String::new(),
            channel: 0,
            note_input: false,
            automation: Vec::new(),
        }
    }
}

/// The full persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDoc {
    pub params: ParamsState,
    pub midi: MidiState,
    pub custom: CustomState,
}

const SECTION_KEYS: [&str; 3] = ["params", "midi", "custom"];

impl StateDoc {
    /// Parse a document, degrading gracefully: a legacy bare params tree
    /// becomes the params section, anything unreadable becomes defaults.
    pub fn from_yaml(text: &str) -> Self {
        let value: serde_yaml::Value = match serde_yaml::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("state: unreadable document, using defaults: {e}");
                return Self::default();
            }
        };

        let serde_yaml::Value::Mapping(ref map) = value else {
            log::warn!("state: document is not a mapping, using defaults");
            return Self::default();
        };

        let has_sections = map
            .keys()
            .any(|k| k.as_str().map_or(false, |s| SECTION_KEYS.contains(&s)));

        if has_sections {
            serde_yaml::from_value(value).unwrap_or_else(|e| {
                log::warn!("state: malformed document, using defaults: {e}");
                Self::default()
            })
        } else {
            // Legacy shape: the whole document is the params tree
            let params = serde_yaml::from_value(value).unwrap_or_default();
            Self {
                params,
                ..Self::default()
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut doc = StateDoc::default();
        doc.params.insert("gain".into(), 0.5);
        doc.midi.channel = 3;
        doc.midi.automation.push(AutomationRecord {
            param: 5,
            channel: 1,
            num: 20,
            kind: AutomationKind::Cc,
            scale: 1.0,
            offset: 0.0,
        });

        let text = doc.to_yaml().unwrap();
        let loaded = StateDoc::from_yaml(&text);
        assert_eq!(loaded.params["gain"], 0.5);
        assert_eq!(loaded.midi.channel, 3);
        assert_eq!(loaded.midi.automation, doc.midi.automation);
    }

    #[test]
    fn test_legacy_bare_params_tree() {
        let text = "gain: 0.25\nmute: 1.0\n";
        let doc = StateDoc::from_yaml(text);
        assert_eq!(doc.params["gain"], 0.25);
        assert_eq!(doc.params["mute"], 1.0);
        assert!(doc.midi.automation.is_empty());
        assert!(doc.custom.is_null());
    }

    #[test]
    fn test_garbage_degrades_to_defaults() {
        let doc = StateDoc::from_yaml(": : :");
        assert!(doc.params.is_empty());

        let doc = StateDoc::from_yaml("- just\n- a\n- list\n");
        assert!(doc.params.is_empty());
    }
}
