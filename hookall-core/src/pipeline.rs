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

//! Asynchronous before/after value pipeline.
//!
//! Same contract as [`HookallSync`](crate::HookallSync), with every hook and
//! the primary operation awaited in turn. Hooks never run concurrently.

use crate::config::HookallConfig;
use crate::error::{ConfigError, HookResult};
use crate::handlers::{AsyncPipelineHook, PipelineCallback};
use crate::lifecycle::LifeCycle;
use crate::store::Engine;
use crate::table::{settle, Repeat, StageTables};
use crate::target::Target;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

type Stages<V> = StageTables<dyn AsyncPipelineHook<V>>;

/// Asynchronous value-threading dispatcher bound to one [`Target`].
pub struct HookallPipeline<V> {
    target: Target,
    hooks: Arc<Stages<V>>,
    config: HookallConfig,
}

impl<V> Clone for HookallPipeline<V> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            hooks: Arc::clone(&self.hooks),
            config: self.config.clone(),
        }
    }
}

impl<V: Send + 'static> HookallPipeline<V> {
    pub const ENGINE: Engine = Engine::Pipeline;

    /// Create a dispatcher for `target` with the default configuration.
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

    /// Register an async preprocessing hook. Its output is awaited and fed
    /// to the next before-hook, or to the primary operation.
    pub fn on_before(&self, command: &str, callback: PipelineCallback<V>) -> &Self {
        self.register(LifeCycle::Before, command, callback, Repeat::Unlimited)
    }

    /// Register an async post-processing hook.
    pub fn on_after(&self, command: &str, callback: PipelineCallback<V>) -> &Self {
        self.register(LifeCycle::After, command, callback, Repeat::Unlimited)
    }

    /// Like [`on_before`](Self::on_before), but runs only once.
    pub fn once_before(&self, command: &str, callback: PipelineCallback<V>) -> &Self {
        self.register(LifeCycle::Before, command, callback, Repeat::ONCE)
    }

    /// Like [`on_after`](Self::on_after), but runs only once.
    pub fn once_after(&self, command: &str, callback: PipelineCallback<V>) -> &Self {
        self.register(LifeCycle::After, command, callback, Repeat::ONCE)
    }

    /// Remove a preprocessing hook, or all of them for `command` when `None`.
    pub fn off_before(&self, command: &str, callback: Option<&PipelineCallback<V>>) -> &Self {
        self.unregister(LifeCycle::Before, command, callback)
    }

    /// Remove a post-processing hook, or all of them for `command` when `None`.
    pub fn off_after(&self, command: &str, callback: Option<&PipelineCallback<V>>) -> &Self {
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
        callback: PipelineCallback<V>,
        repeat: Repeat,
    ) -> &Self {
        self.hooks.register(stage, command, callback, repeat, &self.target);
        self
    }

    fn unregister(
        &self,
        stage: LifeCycle,
        command: &str,
        callback: Option<&PipelineCallback<V>>,
    ) -> &Self {
        self.hooks.off(stage, command, callback, &self.target);
        self
    }

    /// Await `primary` between the before- and after-hooks of `command`.
    pub async fn trigger<F, Fut>(&self, command: &str, initial: V, primary: F) -> HookResult<V>
    where
        F: FnOnce(V) -> Fut,
        Fut: Future<Output = HookResult<V>>,
    {
        let start = Instant::now();
        let value = self.hook_with(LifeCycle::Before, command, initial).await?;
        let value = primary(value).await?;
        let value = self.hook_with(LifeCycle::After, command, value).await?;

        tracing::debug!(
            command,
            scope = %self.target,
            total_time_us = start.elapsed().as_micros() as u64,
            "Pipeline completed"
        );
        Ok(value)
    }

    async fn hook_with(&self, stage: LifeCycle, command: &str, mut value: V) -> HookResult<V> {
        let wrappers = self.hooks.snapshot(stage, command);

        for wrapper in &wrappers {
            if !wrapper.claim() {
                continue;
            }
            if self.config.enable_tracing {
                tracing::trace!(command, %stage, "Invoking pipeline hook");
            }
            value = match wrapper.callback().call(value).await {
                Ok(value) => value,
                Err(e) => {
                    wrapper.refund();
                    return Err(e);
                }
            };
            if settle(self.hooks.stage(stage), wrapper) {
                tracing::trace!(command, %stage, "Retired exhausted pipeline hook");
            }
        }
        Ok(value)
    }
}

impl<V> std::fmt::Debug for HookallPipeline<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookallPipeline")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}
