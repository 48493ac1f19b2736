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

//! Command tables and callback wrappers.

use crate::lifecycle::LifeCycle;
use crate::target::Target;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

const UNLIMITED: i64 = -1;

/// Invocation budget of a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Repeat {
    /// Never removed automatically.
    Unlimited,
    /// Removed right after the n-th invocation.
    Times(u32),
}

impl Repeat {
    pub(crate) const ONCE: Repeat = Repeat::Times(1);

    fn budget(self) -> i64 {
        match self {
            Repeat::Unlimited => UNLIMITED,
            Repeat::Times(n) => i64::from(n),
        }
    }
}

/// A registered callback together with its remaining invocation budget.
///
/// Wrappers are shared between the table and any dispatch pass that
/// snapshotted them. A pass must [`claim`](Self::claim) a wrapper before
/// invoking it, so a wrapper that was removed or used up after the snapshot
/// was taken is skipped.
pub(crate) struct CallbackWrapper<T: ?Sized> {
    callback: Arc<T>,
    command: String,
    remaining: AtomicI64,
    retired: AtomicBool,
}

impl<T: ?Sized> CallbackWrapper<T> {
    fn new(command: &str, callback: Arc<T>, repeat: Repeat) -> Self {
        Self {
            callback,
            command: command.to_string(),
            remaining: AtomicI64::new(repeat.budget()),
            retired: AtomicBool::new(false),
        }
    }

    pub(crate) fn callback(&self) -> &T {
        &self.callback
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    fn wraps(&self, callback: &Arc<T>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(callback))
    }

    fn mark_retired(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Reserve one invocation. Returns `false` when the wrapper has left its
    /// table or every invocation of its budget is already taken.
    pub(crate) fn claim(&self) -> bool {
        if self.is_retired() {
            return false;
        }
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                UNLIMITED => Some(n),
                n if n > 0 => Some(n - 1),
                _ => None,
            })
            .is_ok()
    }

    /// Give back a claimed invocation whose callback failed.
    pub(crate) fn refund(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n != UNLIMITED).then(|| n + 1));
    }

    /// Whether a finite budget has been fully claimed.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) == 0
    }
}

impl<T: ?Sized> fmt::Debug for CallbackWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackWrapper")
            .field("command", &self.command)
            .field("remaining", &self.remaining.load(Ordering::SeqCst))
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Command name to registered wrappers, in registration order.
///
/// A command key is created the first time it is touched and is never
/// removed; clearing a command leaves an empty sequence behind.
pub(crate) struct CommandTable<T: ?Sized> {
    commands: HashMap<String, Vec<Arc<CallbackWrapper<T>>>>,
}

impl<T: ?Sized> Default for CommandTable<T> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }
}

impl<T: ?Sized> CommandTable<T> {
    fn ensure_command(&mut self, command: &str) -> &mut Vec<Arc<CallbackWrapper<T>>> {
        self.commands.entry(command.to_string()).or_default()
    }

    /// Append a callback. Returns the number of wrappers now registered.
    pub(crate) fn register(&mut self, command: &str, callback: Arc<T>, repeat: Repeat) -> usize {
        let wrappers = self.ensure_command(command);
        wrappers.push(Arc::new(CallbackWrapper::new(command, callback, repeat)));
        wrappers.len()
    }

    /// Remove the first wrapper holding `callback`.
    pub(crate) fn remove(&mut self, command: &str, callback: &Arc<T>) -> bool {
        let wrappers = self.ensure_command(command);
        match wrappers.iter().position(|w| w.wraps(callback)) {
            Some(i) => {
                wrappers.remove(i).mark_retired();
                true
            }
            None => false,
        }
    }

    /// Remove every wrapper for `command`. Returns how many were removed.
    pub(crate) fn clear(&mut self, command: &str) -> usize {
        let wrappers = self.ensure_command(command);
        let removed = wrappers.len();
        for wrapper in wrappers.drain(..) {
            wrapper.mark_retired();
        }
        removed
    }

    /// `remove` when a callback is given, `clear` otherwise.
    pub(crate) fn off(&mut self, command: &str, callback: Option<&Arc<T>>) -> usize {
        match callback {
            Some(callback) => usize::from(self.remove(command, callback)),
            None => self.clear(command),
        }
    }

    /// Copy of the current sequence for a dispatch pass.
    pub(crate) fn snapshot(&mut self, command: &str) -> Vec<Arc<CallbackWrapper<T>>> {
        self.ensure_command(command).clone()
    }

    /// Like `snapshot`, without creating the command key.
    pub(crate) fn peek(&self, command: &str) -> Vec<Arc<CallbackWrapper<T>>> {
        self.commands.get(command).cloned().unwrap_or_default()
    }

    /// Remove exactly `wrapper`, leaving other registrations of the same
    /// callback alone.
    pub(crate) fn retire(&mut self, wrapper: &Arc<CallbackWrapper<T>>) -> bool {
        let Some(wrappers) = self.commands.get_mut(wrapper.command()) else {
            return false;
        };
        wrapper.mark_retired();
        match wrappers.iter().position(|w| Arc::ptr_eq(w, wrapper)) {
            Some(i) => {
                wrappers.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self, command: &str) -> usize {
        self.commands.get(command).map_or(0, Vec::len)
    }

    pub(crate) fn contains_command(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }
}

/// Shared, lockable command table.
pub(crate) type SharedTable<T> = Mutex<CommandTable<T>>;

/// Retire `wrapper` from `table` once its budget is used up. Called after a
/// successful invocation; returns `true` when the wrapper was removed.
pub(crate) fn settle<T: ?Sized>(
    table: &SharedTable<T>,
    wrapper: &Arc<CallbackWrapper<T>>,
) -> bool {
    wrapper.is_exhausted() && table.lock().retire(wrapper)
}

/// One table per life-cycle stage, used by the pipeline dispatchers.
pub(crate) struct StageTables<T: ?Sized> {
    before: SharedTable<T>,
    after: SharedTable<T>,
}

impl<T: ?Sized> Default for StageTables<T> {
    fn default() -> Self {
        Self {
            before: Mutex::new(CommandTable::default()),
            after: Mutex::new(CommandTable::default()),
        }
    }
}

impl<T: ?Sized> StageTables<T> {
    pub(crate) fn stage(&self, stage: LifeCycle) -> &SharedTable<T> {
        match stage {
            LifeCycle::Before => &self.before,
            LifeCycle::After => &self.after,
        }
    }

    pub(crate) fn register(
        &self,
        stage: LifeCycle,
        command: &str,
        callback: Arc<T>,
        repeat: Repeat,
        scope: &Target,
    ) -> usize {
        let count = self.stage(stage).lock().register(command, callback, repeat);
        tracing::trace!(command, %stage, %scope, count, "Registered pipeline hook");
        count
    }

    pub(crate) fn off(
        &self,
        stage: LifeCycle,
        command: &str,
        callback: Option<&Arc<T>>,
        scope: &Target,
    ) -> usize {
        let removed = self.stage(stage).lock().off(command, callback);
        tracing::trace!(command, %stage, %scope, removed, "Removed pipeline hooks");
        removed
    }

    pub(crate) fn len(&self, stage: LifeCycle, command: &str) -> usize {
        self.stage(stage).lock().len(command)
    }

    /// Snapshot of `command`'s hooks in `stage`.
    pub(crate) fn snapshot(
        &self,
        stage: LifeCycle,
        command: &str,
    ) -> Vec<Arc<CallbackWrapper<T>>> {
        self.stage(stage).lock().snapshot(command)
    }
}
