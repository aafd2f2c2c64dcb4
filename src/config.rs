//! Engine configuration
//!
//! Everything has a default, so an empty TOML document is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// IBM PC, the number advertised to stories unless configured otherwise
pub const DEFAULT_INTERPRETER_NUMBER: u8 = 6;

/// Interpreter version letter 'G'
pub const DEFAULT_INTERPRETER_VERSION: u8 = 71;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the random generator; entropy when absent
    pub seed: Option<u64>,
    pub screen_width: u8,
    /// 255 means the screen never needs paging
    pub screen_height: u8,
    pub interpreter_number: u8,
    pub interpreter_version: u8,
    /// Start with the transcript stream selected
    pub transcript: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            seed: None,
            screen_width: 80,
            screen_height: 255,
            interpreter_number: DEFAULT_INTERPRETER_NUMBER,
            interpreter_version: DEFAULT_INTERPRETER_VERSION,
            transcript: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Invalid engine config: {e}"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config '{}': {}", path.display(), e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, String> {
        toml::to_string(self).map_err(|e| format!("Cannot serialize engine config: {e}"))
    }
}
