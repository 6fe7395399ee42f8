//! Removal settings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid removal config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings for the removal engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Names of the tools that may remove pieces.
    pub removal_tools: Vec<String>,

    /// Allow admins to remove creative-mode pieces built by other players.
    pub admin_deconstruct_creative: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            removal_tools: vec!["$item_hammer".to_string()],
            admin_deconstruct_creative: false,
        }
    }
}

impl RemovalConfig {
    /// Load settings from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn is_removal_tool(&self, tool: &str) -> bool {
        self.removal_tools.iter().any(|t| t == tool)
    }
}
