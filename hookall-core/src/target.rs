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

//! Scope targets.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Opaque identity that scopes a set of hook registrations.
///
/// Clones share one identity. Two dispatchers created for the same target
/// see the same registrations; dispatchers on different targets never do.
/// The scoped store only keeps a weak reference, so a target's command
/// tables are released once every clone of it has been dropped.
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetId>,
}

pub(crate) struct TargetId {
    id: Uuid,
    label: Option<String>,
}

impl Target {
    /// Create a fresh, anonymous target.
    pub fn new() -> Self {
        Self::from_parts(None)
    }

    /// Create a fresh target with a label used in logs.
    pub fn named(label: impl Into<String>) -> Self {
        Self::from_parts(Some(label.into()))
    }

    fn from_parts(label: Option<String>) -> Self {
        Self {
            inner: Arc::new(TargetId {
                id: Uuid::new_v4(),
                label,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<TargetId> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn is(&self, weak: &Weak<TargetId>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), weak.as_ptr())
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.label {
            Some(label) => f.write_str(label),
            None => write!(f, "{}", self.inner.id),
        }
    }
}
