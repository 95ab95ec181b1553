//! Diagnostic status messages carrying training metrics.

use serde::{Deserialize, Serialize};

/// A single key/value pair; values travel as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// One diagnostic report, typically emitted once per training episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticStatus {
    /// Reporter name (e.g. the environment node)
    #[serde(default)]
    pub name: String,

    /// Identifier of the hardware or run that produced the values
    #[serde(default)]
    pub hardware_id: String,

    #[serde(default)]
    pub values: Vec<KeyValue>,
}

impl DiagnosticStatus {
    pub fn new(name: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_id: hardware_id.into(),
            values: Vec::new(),
        }
    }

    /// Appends a value, formatted with `Display`.
    pub fn with_value(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.values.push(KeyValue {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}
