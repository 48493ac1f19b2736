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

//! Chained async dispatcher.
//!
//! Listeners registered for a command run one after another, each awaited
//! before the next starts. The first listener that returns a value stops
//! the chain and that value becomes the result of `trigger`.
//!
//! A command `save` also picks up listeners registered under the
//! stage-qualified names `before:save` and `after:save`: a trigger runs the
//! before-listeners, then the command's own listeners, then the
//! after-listeners, as one chain.

use crate::config::HookallConfig;
use crate::error::{ConfigError, HookResult};
use crate::handlers::{AsyncCallback, AsyncHook};
use crate::lifecycle::LifeCycle;
use crate::store::Engine;
use crate::table::{settle, CallbackWrapper, Repeat, SharedTable};
use crate::target::Target;
use std::sync::Arc;
use std::time::Instant;

type Table<A, R> = SharedTable<dyn AsyncHook<A, R>>;
type Wrapper<A, R> = Arc<CallbackWrapper<dyn AsyncHook<A, R>>>;

/// Chained async hook dispatcher bound to one [`Target`].
///
/// `A` is the argument every listener receives (cloned per listener) and
/// `R` the value a listener may return to stop the chain. Dispatchers are
/// cheap handles; every dispatcher for the same target and signature
/// shares one command table.
pub struct Hookall<A, R = ()> {
    target: Target,
    commands: Arc<Table<A, R>>,
    config: HookallConfig,
}

impl<A, R> Clone for Hookall<A, R> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            commands: Arc::clone(&self.commands),
            config: self.config.clone(),
        }
    }
}

impl<A, R> Hookall<A, R>
where
    A: Clone + Send + 'static,
    R: Send + 'static,
{
    pub const ENGINE: Engine = Engine::Chained;

    /// Create a dispatcher for `target` with the default configuration.
    pub fn new(target: &Target) -> Self {
        Self::bind(target, HookallConfig::default())
    }

    /// Create a dispatcher for `target` with a custom configuration.
    ///
    /// Fails when `config` does not pass [`HookallConfig::validate`].
    pub fn with_config(target: &Target, config: HookallConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::bind(target, config))
    }

    fn bind(target: &Target, config: HookallConfig) -> Self {
        Self {
            target: target.clone(),
            commands: Self::ENGINE.store().ensure::<Table<A, R>>(target),
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

    /// Register a listener for `command`.
    ///
    /// Listeners run in registration order. `command` may be stage-qualified
    /// (see [`Hookall::qualified`]).
    pub fn on(&self, command: &str, callback: AsyncCallback<A, R>) -> &Self {
        self.register(command, callback, Repeat::Unlimited)
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once(&self, command: &str, callback: AsyncCallback<A, R>) -> &Self {
        self.register(command, callback, Repeat::ONCE)
    }

    fn register(&self, command: &str, callback: AsyncCallback<A, R>, repeat: Repeat) -> &Self {
        let count = self.commands.lock().register(command, callback, repeat);
        let (stage, base) = LifeCycle::split(command, &self.config);
        tracing::trace!(
            command = base,
            stage = stage.map(|s| s.as_str()).unwrap_or("main"),
            scope = %self.target,
            count,
            "Registered hook callback"
        );
        self
    }

    /// Remove `callback` from `command`, or every listener when `None`.
    ///
    /// Only the first registration of `callback` is removed. Removing a
    /// callback that was never registered does nothing.
    pub fn off(&self, command: &str, callback: Option<&AsyncCallback<A, R>>) -> &Self {
        let removed = self.commands.lock().off(command, callback);
        tracing::trace!(command, scope = %self.target, removed, "Removed hook callbacks");
        self
    }

    /// Stage-qualified command name under this dispatcher's configuration.
    pub fn qualified(&self, stage: LifeCycle, command: &str) -> String {
        stage.qualify(command, &self.config)
    }

    /// Number of listeners currently registered under `command` exactly.
    pub fn listener_count(&self, command: &str) -> usize {
        self.commands.lock().len(command)
    }

    /// Whether `command` has ever been touched on this target.
    pub fn has_command(&self, command: &str) -> bool {
        self.commands.lock().contains_command(command)
    }

    /// Run the listener chain for `command`.
    ///
    /// The chain is the before-stage listeners, then the listeners of
    /// `command`, then the after-stage listeners, each group in
    /// registration order. It is snapshotted when the trigger starts:
    /// listeners registered during the pass first run on the next trigger,
    /// while listeners removed or used up during the pass (including by a
    /// nested trigger) are skipped.
    ///
    /// Returns the first `Some` a listener produces, or `None` once every
    /// listener has run. A failing listener aborts the chain and its error
    /// is returned; its once-registration is left in place.
    pub async fn trigger(&self, command: &str, args: A) -> HookResult<Option<R>> {
        let start = Instant::now();
        let chain = self.chain(command);
        if chain.is_empty() {
            return Ok(None);
        }

        tracing::debug!(
            command,
            scope = %self.target,
            hook_count = chain.len(),
            "Dispatching hook chain"
        );

        for (index, wrapper) in chain.iter().enumerate() {
            if !wrapper.claim() {
                continue;
            }
            if self.config.enable_tracing {
                tracing::trace!(command = wrapper.command(), index, "Invoking hook callback");
            }

            let result = match wrapper.callback().call(args.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    wrapper.refund();
                    tracing::debug!(
                        command,
                        failed_at = wrapper.command(),
                        index,
                        error = %e,
                        "Hook chain aborted"
                    );
                    return Err(e);
                }
            };
            self.settle(wrapper);

            if result.is_some() {
                tracing::debug!(
                    command,
                    stopped_at = wrapper.command(),
                    index,
                    total_time_us = start.elapsed().as_micros() as u64,
                    "Hook chain stopped"
                );
                return Ok(result);
            }
        }

        tracing::debug!(
            command,
            hook_count = chain.len(),
            total_time_us = start.elapsed().as_micros() as u64,
            "Hook chain completed"
        );
        Ok(None)
    }

    fn chain(&self, command: &str) -> Vec<Wrapper<A, R>> {
        let before = self.qualified(LifeCycle::Before, command);
        let after = self.qualified(LifeCycle::After, command);

        let mut table = self.commands.lock();
        let mut chain = table.peek(&before);
        chain.extend(table.snapshot(command));
        chain.extend(table.peek(&after));
        chain
    }

    fn settle(&self, wrapper: &Wrapper<A, R>) {
        if settle(&self.commands, wrapper) {
            tracing::trace!(
                command = wrapper.command(),
                scope = %self.target,
                "Retired exhausted hook callback"
            );
        }
    }
}

impl<A, R> std::fmt::Debug for Hookall<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hookall")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}
