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

//! Callback traits and closure adapters.
//!
//! Callbacks are registered as `Arc` trait objects. The `Arc` doubles as the
//! callback's identity: keep a clone of the handle you registered and pass
//! it back to `off` to remove exactly that callback.

use crate::error::HookResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Listener for the chained dispatcher.
///
/// Returning `Ok(Some(_))` stops the chain and becomes the result of
/// `trigger`; `Ok(None)` hands control to the next listener.
#[async_trait]
pub trait AsyncHook<A, R>: Send + Sync {
    async fn call(&self, args: A) -> HookResult<Option<R>>;
}

/// Shared handle to a chained-dispatcher listener.
pub type AsyncCallback<A, R> = Arc<dyn AsyncHook<A, R>>;

#[async_trait]
impl<A, R, F, Fut> AsyncHook<A, R> for F
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult<Option<R>>> + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    async fn call(&self, args: A) -> HookResult<Option<R>> {
        (self)(args).await
    }
}

/// Wrap an async closure as a chained-dispatcher listener.
pub fn async_hook<A, R, F, Fut>(f: F) -> AsyncCallback<A, R>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult<Option<R>>> + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    Arc::new(f)
}

/// Stage of the synchronous value pipeline: maps the running value.
pub trait PipelineHook<V>: Send + Sync {
    fn call(&self, value: V) -> HookResult<V>;
}

/// Shared handle to a synchronous pipeline stage.
pub type SyncCallback<V> = Arc<dyn PipelineHook<V>>;

impl<V, F> PipelineHook<V> for F
where
    F: Fn(V) -> HookResult<V> + Send + Sync,
{
    fn call(&self, value: V) -> HookResult<V> {
        (self)(value)
    }
}

/// Wrap a closure as a synchronous pipeline stage.
pub fn sync_hook<V, F>(f: F) -> SyncCallback<V>
where
    F: Fn(V) -> HookResult<V> + Send + Sync + 'static,
    V: 'static,
{
    Arc::new(f)
}

/// Stage of the asynchronous value pipeline.
#[async_trait]
pub trait AsyncPipelineHook<V>: Send + Sync {
    async fn call(&self, value: V) -> HookResult<V>;
}

/// Shared handle to an asynchronous pipeline stage.
pub type PipelineCallback<V> = Arc<dyn AsyncPipelineHook<V>>;

#[async_trait]
impl<V, F, Fut> AsyncPipelineHook<V> for F
where
    F: Fn(V) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult<V>> + Send + 'static,
    V: Send + 'static,
{
    async fn call(&self, value: V) -> HookResult<V> {
        (self)(value).await
    }
}

/// Wrap an async closure as an asynchronous pipeline stage.
pub fn pipeline_hook<V, F, Fut>(f: F) -> PipelineCallback<V>
where
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult<V>> + Send + 'static,
    V: Send + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AsyncHook<u32, u32> for CountingHook {
        async fn call(&self, args: u32) -> HookResult<Option<u32>> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((calls as u32 >= args).then_some(calls as u32))
        }
    }

    #[tokio::test]
    async fn test_struct_hook() {
        let hook = CountingHook {
            calls: AtomicUsize::new(0),
        };
        assert_eq!(hook.call(2).await.unwrap(), None);
        assert_eq!(hook.call(2).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_async_closure() {
        let hook = async_hook(|n: u32| async move { HookResult::Ok(Some(n + 1)) });
        assert_eq!(hook.call(1).await.unwrap(), Some(2));
    }

    #[test]
    fn test_sync_closure() {
        let hook = sync_hook(|n: i64| Ok(n * n));
        assert_eq!(hook.call(3).unwrap(), 9);

        let failing = sync_hook(|_: i64| Err(HookError::msg("nope")));
        assert!(failing.call(3).is_err());
    }

    #[tokio::test]
    async fn test_pipeline_closure() {
        let hook = pipeline_hook(|s: String| async move { HookResult::Ok(s + "!") });
        assert_eq!(hook.call("hi".to_string()).await.unwrap(), "hi!");
    }

    #[test]
    fn test_handles_have_distinct_identity() {
        let a = sync_hook(|n: i64| Ok(n));
        let b = sync_hook(|n: i64| Ok(n));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &a.clone()));
    }
}
