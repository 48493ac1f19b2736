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

//! Scoped storage binding a [`Target`] to its command tables.
//!
//! Each dispatcher engine owns one process-wide [`ScopedStore`] and one
//! global [`Target`]. Entries are keyed by target identity and table type
//! and hold the target weakly: once the last clone of a target is dropped
//! its tables become unreachable. Dead entries are swept whenever the store
//! grows past a threshold that tracks the live entry count.

use crate::target::{Target, TargetId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Weak};

/// The dispatcher engines, each with its own store and global target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// [`Hookall`](crate::Hookall): chained async listeners.
    Chained,
    /// [`HookallSync`](crate::HookallSync): synchronous value pipeline.
    Sync,
    /// [`HookallPipeline`](crate::HookallPipeline): async value pipeline.
    Pipeline,
}

static CHAINED_STORE: LazyLock<ScopedStore> = LazyLock::new(|| ScopedStore::new("hookall"));
static SYNC_STORE: LazyLock<ScopedStore> = LazyLock::new(|| ScopedStore::new("hookall-sync"));
static PIPELINE_STORE: LazyLock<ScopedStore> =
    LazyLock::new(|| ScopedStore::new("hookall-pipeline"));

static CHAINED_GLOBAL: LazyLock<Target> = LazyLock::new(|| Target::named("hookall:global"));
static SYNC_GLOBAL: LazyLock<Target> = LazyLock::new(|| Target::named("hookall-sync:global"));
static PIPELINE_GLOBAL: LazyLock<Target> =
    LazyLock::new(|| Target::named("hookall-pipeline:global"));

impl Engine {
    pub fn name(self) -> &'static str {
        self.store().name()
    }

    /// The engine's process-wide store.
    pub fn store(self) -> &'static ScopedStore {
        match self {
            Engine::Chained => &CHAINED_STORE,
            Engine::Sync => &SYNC_STORE,
            Engine::Pipeline => &PIPELINE_STORE,
        }
    }

    /// The shared target used when a dispatcher is created without one.
    ///
    /// Registrations made through the global target are visible to every
    /// caller of the same engine; use a fresh [`Target`] for isolation.
    pub fn global(self) -> &'static Target {
        match self {
            Engine::Chained => &CHAINED_GLOBAL,
            Engine::Sync => &SYNC_GLOBAL,
            Engine::Pipeline => &PIPELINE_GLOBAL,
        }
    }
}

struct StoreEntry {
    owner: Weak<TargetId>,
    table: Box<dyn Any + Send + Sync>,
}

impl StoreEntry {
    fn create<T>(target: &Target) -> (Self, Arc<T>)
    where
        T: Default + Send + Sync + 'static,
    {
        let table = Arc::new(T::default());
        let entry = Self {
            owner: target.downgrade(),
            table: Box::new(Arc::clone(&table)),
        };
        (entry, table)
    }

    fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }

    fn table_for<T: Send + Sync + 'static>(&self, target: &Target) -> Option<Arc<T>> {
        if !self.is_live() || !target.is(&self.owner) {
            return None;
        }
        self.table.downcast_ref::<Arc<T>>().cloned()
    }
}

/// Minimum entry count before `ensure` sweeps dead entries.
const PRUNE_FLOOR: usize = 64;

/// Association from [`Target`] to command tables with weak keys.
pub struct ScopedStore {
    name: &'static str,
    entries: DashMap<(usize, TypeId), StoreEntry>,
    prune_at: AtomicUsize,
}

impl ScopedStore {
    /// Create an empty store. `name` only appears in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            prune_at: AtomicUsize::new(PRUNE_FLOOR),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the table of type `T` for `target`, creating it on first use.
    ///
    /// Repeated calls with the same target and table type return the same
    /// instance.
    pub fn ensure<T>(&self, target: &Target) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        self.maybe_prune();

        let key = (target.addr(), TypeId::of::<T>());
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(table) = occupied.get().table_for::<T>(target) {
                    return table;
                }
                let (entry, table) = StoreEntry::create::<T>(target);
                occupied.insert(entry);
                tracing::trace!(store = self.name, scope = %target, "Replaced stale command table");
                table
            }
            Entry::Vacant(vacant) => {
                let (entry, table) = StoreEntry::create::<T>(target);
                vacant.insert(entry);
                tracing::trace!(store = self.name, scope = %target, "Created command table");
                table
            }
        }
    }

    /// Whether `target` currently owns any table in this store.
    pub fn contains(&self, target: &Target) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.key().0 == target.addr() && target.is(&entry.value().owner))
    }

    /// Drop every table owned by `target`. Returns how many were removed.
    ///
    /// Dispatchers already bound to `target` keep working on their own copy
    /// of the table; new dispatchers start empty.
    pub fn release(&self, target: &Target) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(addr, _), entry| !(*addr == target.addr() && target.is(&entry.owner)));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(store = self.name, scope = %target, removed, "Released command tables");
        }
        removed
    }

    /// Remove entries whose target has been dropped.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let after = self.entries.len();
        self.prune_at.store((after * 2).max(PRUNE_FLOOR), Ordering::Relaxed);
        before.saturating_sub(after)
    }

    fn maybe_prune(&self) {
        if self.entries.len() < self.prune_at.load(Ordering::Relaxed) {
            return;
        }
        let removed = self.prune();
        if removed > 0 {
            tracing::trace!(store = self.name, removed, "Pruned dead command tables");
        }
    }

    /// Number of entries whose target is still alive.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStore")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}
