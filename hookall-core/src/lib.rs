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

//! Hookall Core
//!
//! Per-target hook dispatch. Unrelated parts of a program register named
//! callbacks against a [`Target`] and later invoke every callback for a
//! name.
//!
//! # Engines
//!
//! - [`Hookall`]: chained async listeners. Listeners run in registration
//!   order until one returns a value, which becomes the result of the
//!   trigger. Commands may carry `before:`/`after:` stages.
//! - [`HookallSync`]: synchronous value pipeline. Before-hooks transform the
//!   input of a primary operation, after-hooks transform its output.
//! - [`HookallPipeline`]: the same pipeline with async hooks.
//!
//! Each engine keeps its registrations in a process-wide [`ScopedStore`]
//! keyed by target. Dispatchers created for the same target share their
//! registrations; dispatchers created without a target share the engine's
//! global target.
//!
//! # Example
//!
//! ```rust
//! use hookall_core::{sync_hook, use_hookall_sync, Target};
//!
//! let editor = Target::named("editor");
//! let hook = use_hookall_sync::<i64>(Some(&editor));
//!
//! hook.once_before("save", sync_hook(|n: i64| Ok(n * n)))
//!     .on_before("save", sync_hook(|n: i64| Ok(n * n)))
//!     .once_after("save", sync_hook(|n: i64| Ok(n + 1)))
//!     .on_after("save", sync_hook(|n: i64| Ok(n + 2)));
//!
//! assert_eq!(hook.trigger("save", 2, Ok).unwrap(), 19);
//! assert_eq!(hook.trigger("save", 2, Ok).unwrap(), 6);
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod hookall;
pub mod lifecycle;
pub mod pipeline;
pub mod store;
pub mod sync;
pub mod target;

mod table;

pub use config::HookallConfig;
pub use error::{ConfigError, HookError, HookResult};
pub use handlers::{
    async_hook, pipeline_hook, sync_hook, AsyncCallback, AsyncHook, AsyncPipelineHook,
    PipelineCallback, PipelineHook, SyncCallback,
};
pub use hookall::Hookall;
pub use lifecycle::LifeCycle;
pub use pipeline::HookallPipeline;
pub use store::{Engine, ScopedStore};
pub use sync::HookallSync;
pub use target::Target;

/// Create a chained dispatcher for `target`, or for the global target when
/// `None`.
pub fn use_hookall<A, R>(target: Option<&Target>) -> Hookall<A, R>
where
    A: Clone + Send + 'static,
    R: Send + 'static,
{
    Hookall::new(target.unwrap_or_else(|| Engine::Chained.global()))
}

/// Create a synchronous pipeline dispatcher for `target`, or for the global
/// target when `None`.
pub fn use_hookall_sync<V: 'static>(target: Option<&Target>) -> HookallSync<V> {
    HookallSync::new(target.unwrap_or_else(|| Engine::Sync.global()))
}

/// Create an asynchronous pipeline dispatcher for `target`, or for the
/// global target when `None`.
pub fn use_hookall_pipeline<V: Send + 'static>(target: Option<&Target>) -> HookallPipeline<V> {
    HookallPipeline::new(target.unwrap_or_else(|| Engine::Pipeline.global()))
}
