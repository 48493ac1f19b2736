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

//! Synchronous before/after value pipeline.

use crate::config::HookallConfig;
use crate::error::{ConfigError, HookResult};
use crate::handlers::{PipelineHook, SyncCallback};
use crate::lifecycle::LifeCycle;
use crate::store::Engine;
use crate::table::{settle, Repeat, StageTables};
use crate::target::Target;
use std::sync::Arc;

type Stages<V> = StageTables<dyn PipelineHook<V>>;

/// Synchronous value-threading dispatcher bound to one [`Target`].
///
/// `trigger(command, initial, primary)` feeds `initial` through every
/// before-hook of `command` in registration order, hands the result to
/// `primary`, then feeds `primary`'s output through every after-hook. There
/// is no short-circuit: every registered hook runs.
pub struct HookallSync<V> {
    target: Target,
    hooks: Arc<Stages<V>>,
    config: HookallConfig,
}

impl<V> Clone for HookallSync<V> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            hooks: Arc::clone(&self.hooks),
            config: self.config.clone(),
        }
    }
}

impl<V: 'static> HookallSync<V> {
    pub const ENGINE: Engine = Engine::Sync;

    pub fn new(target: &Target) -> Self {
        Self::bind(target, HookallConfig::default())
    }

    /// Create a dispatcher with a custom configuration, rejecting one that
    /// fails [`HookallConfig::validate`].
    pub fn with_config(target: &Target, config: HookallConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::bind(target, config))
    }

    fn bind(target: &Target, config: HookallConfig) -> Self {
        Self {
            target: target.clone(),
            hooks: Self::ENGINE.store().ensure::<Stages<V>>(target),
            config,
        }
    }

    /// Create a dispatcher bound to the engine's global target.
    pub fn global() -> Self {
        Self::new(Self::ENGINE.global())
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &HookallConfig {
        &self.config
    }

    /// Register a preprocessing hook. Its return value replaces the value
    /// passed on to the next before-hook, or to the primary callback.
    pub fn on_before(&self, command: &str, callback: SyncCallback<V>) -> &Self {
        self.register(LifeCycle::Before, command, callback, Repeat::Unlimited)
    }

    /// Register a post-processing hook. It receives the primary callback's
    /// result, or the previous after-hook's.
    pub fn on_after(&self, command: &str, callback: SyncCallback<V>) -> &Self {
        self.register(LifeCycle::After, command, callback, Repeat::Unlimited)
    }

    /// Like [`on_before`](Self::on_before), but runs only once.
    pub fn once_before(&self, command: &str, callback: SyncCallback<V>) -> &Self {
        self.register(LifeCycle::Before, command, callback, Repeat::ONCE)
    }

    /// Like [`on_after`](Self::on_after), but runs only once.
    pub fn once_after(&self, command: &str, callback: SyncCallback<V>) -> &Self {
        self.register(LifeCycle::After, command, callback, Repeat::ONCE)
    }

    /// Remove a preprocessing hook, or all of them for `command` when `None`.
    pub fn off_before(&self, command: &str, callback: Option<&SyncCallback<V>>) -> &Self {
        self.unregister(LifeCycle::Before, command, callback)
    }

    /// Remove a post-processing hook, or all of them for `command` when `None`.
    pub fn off_after(&self, command: &str, callback: Option<&SyncCallback<V>>) -> &Self {
        self.unregister(LifeCycle::After, command, callback)
    }

    /// Number of hooks registered for `command` in `stage`.
    pub fn hook_count(&self, stage: LifeCycle, command: &str) -> usize {
        self.hooks.len(stage, command)
    }

    fn register(
        &self,
        stage: LifeCycle,
        command: &str,
        callback: SyncCallback<V>,
        repeat: Repeat,
    ) -> &Self {
        self.hooks.register(stage, command, callback, repeat, &self.target);
        self
    }

    fn unregister(
        &self,
        stage: LifeCycle,
        command: &str,
        callback: Option<&SyncCallback<V>>,
    ) -> &Self {
        self.hooks.off(stage, command, callback, &self.target);
        self
    }

    /// Run `primary` between the before- and after-hooks of `command`.
    ///
    /// With no hooks registered this is just `primary(initial)`. A failing
    /// hook or primary aborts the pipeline; once-hooks that already ran
    /// before the failure stay consumed.
    pub fn trigger<F>(&self, command: &str, initial: V, primary: F) -> HookResult<V>
    where
        F: FnOnce(V) -> HookResult<V>,
    {
        let value = self.hook_with(LifeCycle::Before, command, initial)?;
        let value = primary(value)?;
        self.hook_with(LifeCycle::After, command, value)
    }

    fn hook_with(&self, stage: LifeCycle, command: &str, value: V) -> HookResult<V> {
        let wrappers = self.hooks.snapshot(stage, command);
        if wrappers.is_empty() {
            return Ok(value);
        }

        tracing::debug!(command, %stage, hook_count = wrappers.len(), "Running pipeline stage");

        wrappers.iter().try_fold(value, |value, wrapper| {
            if !wrapper.claim() {
                return Ok(value);
            }
            if self.config.enable_tracing {
                tracing::trace!(command, %stage, "Invoking pipeline hook");
            }
            let value = match wrapper.callback().call(value) {
                Ok(value) => value,
                Err(e) => {
                    wrapper.refund();
                    return Err(e);
                }
            };
            if settle(self.hooks.stage(stage), wrapper) {
                tracing::trace!(command, %stage, "Retired exhausted pipeline hook");
            }
            Ok(value)
        })
    }
}

impl<V> std::fmt::Debug for HookallSync<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookallSync")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::handlers::sync_hook;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn local() -> HookallSync<i64> {
        HookallSync::new(&Target::new())
    }

    fn identity(n: i64) -> HookResult<i64> {
        Ok(n)
    }

    #[test]
    fn test_no_hooks_is_identity() {
        let hook = local();
        assert_eq!(hook.trigger("x", 7, identity).unwrap(), 7);
        assert_eq!(hook.trigger("x", 7, |n| Ok(n * 3)).unwrap(), 21);
    }

    #[test]
    fn test_before_hooks_compose_in_order() {
        let hook = local();
        hook.on_before("lifecycle1", sync_hook(|n: i64| Ok(n * n)))
            .on_before("lifecycle1", sync_hook(|n: i64| Ok(n + n)));

        // (2 * 2) + (2 * 2), not (2 + 2) * (2 + 2)
        assert_eq!(hook.trigger("lifecycle1", 2, identity).unwrap(), 8);
    }

    #[test]
    fn test_once_hooks() {
        let hook = local();
        hook.once_before("x", sync_hook(|n: i64| Ok(n * n)))
            .on_before("x", sync_hook(|n: i64| Ok(n * n)))
            .once_after("x", sync_hook(|n: i64| Ok(n + 1)))
            .on_after("x", sync_hook(|n: i64| Ok(n + 2)));

        assert_eq!(hook.trigger("x", 2, identity).unwrap(), 19);
        assert_eq!(hook.trigger("x", 2, identity).unwrap(), 6);
        assert_eq!(hook.trigger("x", 3, identity).unwrap(), 11);
        assert_eq!(hook.hook_count(LifeCycle::Before, "x"), 1);
        assert_eq!(hook.hook_count(LifeCycle::After, "x"), 1);
    }

    #[test]
    fn test_primary_sees_before_result() {
        let seen = Mutex::new(None);
        let hook = local();
        hook.on_before("x", sync_hook(|n: i64| Ok(n - 1)));

        let result = hook.trigger("x", 10, |n| {
            *seen.lock() = Some(n);
            Ok(n * 100)
        });
        assert_eq!(result.unwrap(), 900);
        assert_eq!(*seen.lock(), Some(9));
    }

    #[test]
    fn test_off_before_single() {
        let hook = local();
        let square = sync_hook(|n: i64| Ok(n * n));
        hook.on_before("x", Arc::clone(&square))
            .on_before("x", sync_hook(|n: i64| Ok(n + 1)));

        hook.off_before("x", Some(&square));
        assert_eq!(hook.trigger("x", 5, identity).unwrap(), 6);
    }

    #[test]
    fn test_off_after_all() {
        let hook = local();
        hook.on_after("x", sync_hook(|n: i64| Ok(n + 1)))
            .on_after("x", sync_hook(|n: i64| Ok(n + 1)))
            .on_before("x", sync_hook(|n: i64| Ok(n * 2)));

        hook.off_after("x", None).off_after("x", None);
        assert_eq!(hook.hook_count(LifeCycle::After, "x"), 0);
        assert_eq!(hook.trigger("x", 5, identity).unwrap(), 10);
    }

    #[test]
    fn test_stages_are_separate() {
        let hook = local();
        let shared = sync_hook(|n: i64| Ok(n + 1));
        hook.on_before("x", Arc::clone(&shared))
            .on_after("x", Arc::clone(&shared));

        hook.off_before("x", Some(&shared));
        assert_eq!(hook.hook_count(LifeCycle::After, "x"), 1);
        assert_eq!(hook.trigger("x", 0, identity).unwrap(), 1);
    }

    #[test]
    fn test_failing_primary_skips_after_stage() {
        let after_runs = Arc::new(Mutex::new(0));
        let hook = local();
        let counter = Arc::clone(&after_runs);
        hook.once_before("x", sync_hook(|n: i64| Ok(n + 1)))
            .on_after(
                "x",
                sync_hook(move |n: i64| {
                    *counter.lock() += 1;
                    Ok(n)
                }),
            );

        let err = hook
            .trigger("x", 0, |_| Err(HookError::msg("primary failed")))
            .unwrap_err();
        assert_eq!(err.source_error().to_string(), "primary failed");
        assert_eq!(*after_runs.lock(), 0);
        // The once-hook ran before the failure and stays consumed.
        assert_eq!(hook.hook_count(LifeCycle::Before, "x"), 0);
    }

    #[test]
    fn test_failing_hook_is_not_consumed() {
        let hook = local();
        hook.once_before("x", sync_hook(|_: i64| Err(HookError::msg("nope"))));

        assert!(hook.trigger("x", 1, identity).is_err());
        assert_eq!(hook.hook_count(LifeCycle::Before, "x"), 1);
    }

    #[test]
    fn test_targets_are_isolated() {
        let first = local();
        let second = local();
        first.on_before("x", sync_hook(|n: i64| Ok(n * 10)));

        assert_eq!(first.trigger("x", 1, identity).unwrap(), 10);
        assert_eq!(second.trigger("x", 1, identity).unwrap(), 1);
    }

    #[test]
    fn test_reentrant_trigger() {
        let hook = local();
        let inner = hook.clone();
        hook.on_after(
            "outer",
            sync_hook(move |n: i64| inner.trigger("inner", n, |v| Ok(v + 1))),
        );
        hook.on_before("inner", sync_hook(|n: i64| Ok(n * 2)));

        // before: none; primary: 3; after: inner(3) = 3 * 2 + 1
        assert_eq!(hook.trigger("outer", 3, identity).unwrap(), 7);
    }

    #[test]
    fn test_non_numeric_values() {
        let hook = HookallSync::<String>::new(&Target::new());
        hook.on_before("greet", sync_hook(|s: String| Ok(s.trim().to_string())))
            .on_after("greet", sync_hook(|s: String| Ok(format!("{s}!"))));

        let result = hook.trigger("greet", "  hello ".to_string(), |s| Ok(s.to_uppercase()));
        assert_eq!(result.unwrap(), "HELLO!");
    }

    #[test]
    fn test_nested_trigger_consumes_once_hook() {
        let runs = Arc::new(AtomicUsize::new(0));
        let hook = local();
        let inner = hook.clone();
        hook.on_before(
            "x",
            sync_hook(move |n: i64| {
                if n == 0 {
                    inner.trigger("x", 100, identity).map(|_| n)
                } else {
                    Ok(n)
                }
            }),
        );
        let counted = Arc::clone(&runs);
        hook.once_before(
            "x",
            sync_hook(move |n: i64| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(n + 1)
            }),
        );

        // The nested trigger used up the once-hook, so the outer pass skips it.
        assert_eq!(hook.trigger("x", 0, identity).unwrap(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(hook.hook_count(LifeCycle::Before, "x"), 1);
        assert_eq!(hook.trigger("x", 5, identity).unwrap(), 5);
    }

    #[test]
    fn test_hook_removed_mid_pass_is_skipped() {
        let hook = local();
        let doubled = sync_hook(|n: i64| Ok(n * 2));
        let inner = hook.clone();
        let removed = Arc::clone(&doubled);
        hook.on_before(
            "x",
            sync_hook(move |n: i64| {
                inner.off_before("x", Some(&removed));
                Ok(n + 1)
            }),
        )
        .on_before("x", doubled);

        assert_eq!(hook.trigger("x", 1, identity).unwrap(), 2);
        assert_eq!(hook.hook_count(LifeCycle::Before, "x"), 1);
    }

    #[test]
    fn test_with_config_rejects_invalid_prefixes() {
        let target = Target::new();
        let empty = HookallConfig::default().with_after_prefix("");
        assert!(HookallSync::<i64>::with_config(&target, empty).is_err());
        assert!(HookallSync::<i64>::with_config(&target, HookallConfig::default()).is_ok());
    }
}
