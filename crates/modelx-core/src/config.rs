//! Session configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! id_base = "0a1b"          # hex prefix for generated ids
//! # id_base_numeric = 42    # or a number, normalized to 8 hex digits
//! history_depth = 100       # undo limit; unlimited when absent
//! log_profile = "development"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::errors::{ModelXError, Result};
use crate::logging_facility::Profile;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub id_base: Option<String>,
    pub id_base_numeric: Option<u32>,
    pub history_depth: Option<usize>,
    /// Logging is initialized by `Session::from_config` when set
    pub log_profile: Option<Profile>,
}

impl SessionConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed TOML, unknown keys, or
    /// conflicting settings.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ModelXError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read, plus the errors
    /// of [`SessionConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ModelXError::InvalidConfig {
            reason: format!("failed to read '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Check settings that cannot be combined
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if both id bases are set, the hex base is
    /// not valid hex, or the history depth is zero.
    pub fn validate(&self) -> Result<()> {
        if self.id_base.is_some() && self.id_base_numeric.is_some() {
            return Err(ModelXError::InvalidConfig {
                reason: "set either id_base or id_base_numeric, not both".to_string(),
            });
        }
        if let Some(base) = &self.id_base {
            hex::decode(base).map_err(|e| ModelXError::InvalidConfig {
                reason: format!("id_base '{}' is not hex: {}", base, e),
            })?;
        }
        if self.history_depth == Some(0) {
            return Err(ModelXError::InvalidConfig {
                reason: "history_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
