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

//! Before/after life-cycle stages.
//!
//! The chained dispatcher encodes stages in the command name itself
//! (`before:save`, `after:save`), while the pipeline dispatchers keep one
//! command table per stage. [`LifeCycle`] names the stage in both cases.

use crate::config::HookallConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pre- or post-processing slot around a primary action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeCycle {
    Before,
    After,
}

impl LifeCycle {
    /// Both stages, in execution order.
    pub const ALL: [LifeCycle; 2] = [LifeCycle::Before, LifeCycle::After];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifeCycle::Before => "before",
            LifeCycle::After => "after",
        }
    }

    /// The command prefix for this stage under `config`.
    pub fn prefix<'a>(&self, config: &'a HookallConfig) -> &'a str {
        match self {
            LifeCycle::Before => &config.before_prefix,
            LifeCycle::After => &config.after_prefix,
        }
    }

    /// Build the stage-qualified command name, e.g. `before:save`.
    pub fn qualify(&self, command: &str, config: &HookallConfig) -> String {
        format!("{}{}", self.prefix(config), command)
    }

    /// Split a command name into its stage and base command.
    ///
    /// Returns `None` for the stage when `command` carries neither prefix.
    pub fn split<'a>(command: &'a str, config: &HookallConfig) -> (Option<LifeCycle>, &'a str) {
        for stage in Self::ALL {
            if let Some(base) = command.strip_prefix(stage.prefix(config)) {
                return (Some(stage), base);
            }
        }
        (None, command)
    }
}

impl fmt::Display for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
