//! # ECPS Configuration
//!
//! Sizing knobs for one instance, loaded once at startup from TOML.
//!
//! ```toml
//! max_entities = 4096
//! initial_directory_capacity = 1024
//! initial_command_buffer_bytes = 8192
//! initial_archetype_capacity = 64
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::MAX_ENTITY_CAPACITY;
use crate::error::{EcpsError, EcpsResult};

/// Sizing configuration of an ECPS instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcpsConfig {
    /// Maximum number of live entities.
    pub max_entities: usize,
    /// Entity directory entries reserved up front.
    pub initial_directory_capacity: usize,
    /// Bytes reserved for the deferred command log.
    pub initial_command_buffer_bytes: usize,
    /// Records reserved by each new archetype.
    pub initial_archetype_capacity: usize,
}

impl Default for EcpsConfig {
    fn default() -> Self {
        Self {
            max_entities: MAX_ENTITY_CAPACITY,
            initial_directory_capacity: 256,
            initial_command_buffer_bytes: 4096,
            initial_archetype_capacity: 16,
        }
    }
}

impl EcpsConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcpsError::InvalidConfig`] on malformed TOML, unknown keys,
    /// or out-of-range values.
    pub fn from_toml_str(source: &str) -> EcpsResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EcpsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EcpsError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`EcpsConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcpsResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Fails if `max_entities` is zero or above the 16-bit index space.
    pub fn validate(&self) -> EcpsResult<()> {
        if self.max_entities == 0 || self.max_entities > MAX_ENTITY_CAPACITY {
            return Err(EcpsError::InvalidConfig(format!(
                "max_entities must be in 1..={MAX_ENTITY_CAPACITY}, got {}",
                self.max_entities
            )));
        }
        Ok(())
    }
}
