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

//! Error types for hook dispatch and configuration.

use thiserror::Error;

/// Result type returned by callbacks and by every `trigger`.
pub type HookResult<T> = Result<T, HookError>;

/// Errors raised while dispatching hooks.
///
/// The dispatchers never produce an error of their own: triggering a command
/// with nothing registered, or removing a callback that was never added, is a
/// no-op. The only failure path is a callback that fails, and that failure is
/// handed back to the caller of `trigger` unchanged.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook callback failed: {0}")]
    Callback(#[from] anyhow::Error),
}

impl HookError {
    /// Create a callback failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        HookError::Callback(anyhow::Error::msg(message.into()))
    }

    /// Borrow the underlying callback error.
    pub fn source_error(&self) -> &anyhow::Error {
        match self {
            HookError::Callback(e) => e,
        }
    }
}

/// Errors that can occur while loading a [`HookallConfig`](crate::HookallConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse hook configuration: {0}")]
    ParseError(String),

    #[error("Invalid hook configuration: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::ParseError(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::ParseError(e.to_string())
    }
}
