//! Machine configuration.
//!
//! Configuration can come from a JSON file; every field is optional and
//! falls back to its default:
//!
//! ```json
//! { "memory_size": 65536, "load_address": 4096, "max_steps": 1000 }
//! ```

use crate::asm::image::DEFAULT_LOAD_ADDRESS;
use crate::cpu::memory::DEFAULT_MEMORY_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default step budget for a run.
pub const DEFAULT_MAX_STEPS: u64 = 1000;

/// Settings for building and running a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Memory capacity in bytes.
    pub memory_size: usize,
    /// Address the program image is loaded at and execution starts from.
    pub load_address: u32,
    /// Maximum number of instructions per run.
    pub max_steps: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            load_address: DEFAULT_LOAD_ADDRESS,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Check that the values describe a usable machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::Invalid("memory_size must be non-zero".into()));
        }
        if self.load_address as usize >= self.memory_size {
            return Err(ConfigError::Invalid(format!(
                "load_address {:#x} is outside memory of {:#x} bytes",
                self.load_address, self.memory_size
            )));
        }
        Ok(())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid configuration file: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
