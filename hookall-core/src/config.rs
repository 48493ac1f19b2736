// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Dispatcher configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration shared by the hook dispatchers.
///
/// # Example JSON Configuration
///
/// ```json
/// {
///     "before_prefix": "pre:",
///     "after_prefix": "post:",
///     "enable_tracing": true
/// }
/// ```
///
/// Every field is optional; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookallConfig {
    /// Prefix that marks a command as a before-stage of another command
    /// in the chained dispatcher.
    #[serde(default = "default_before_prefix")]
    pub before_prefix: String,

    /// Prefix that marks a command as an after-stage of another command
    /// in the chained dispatcher.
    #[serde(default = "default_after_prefix")]
    pub after_prefix: String,

    /// Emit a trace event for every callback invocation.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_before_prefix() -> String {
    "before:".to_string()
}

fn default_after_prefix() -> String {
    "after:".to_string()
}

impl Default for HookallConfig {
    fn default() -> Self {
        Self {
            before_prefix: default_before_prefix(),
            after_prefix: default_after_prefix(),
            enable_tracing: false,
        }
    }
}

impl HookallConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Both life-cycle prefixes must be non-empty and distinct, otherwise a
    /// plain command could not be told apart from its stages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.before_prefix.is_empty() {
            return Err(ConfigError::Invalid("before_prefix must not be empty".into()));
        }
        if self.after_prefix.is_empty() {
            return Err(ConfigError::Invalid("after_prefix must not be empty".into()));
        }
        if self.before_prefix == self.after_prefix {
            return Err(ConfigError::Invalid(format!(
                "before_prefix and after_prefix are both {:?}",
                self.before_prefix
            )));
        }
        Ok(())
    }

    /// Set the before-stage prefix.
    pub fn with_before_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.before_prefix = prefix.into();
        self
    }

    /// Set the after-stage prefix.
    pub fn with_after_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.after_prefix = prefix.into();
        self
    }

    /// Enable or disable per-callback tracing.
    pub fn with_tracing(mut self, enable_tracing: bool) -> Self {
        self.enable_tracing = enable_tracing;
        self
    }
}
