//! Loader abstraction.
//!
//! A loader is the async call that produces a fresh value for one key. The
//! store keeps the most recent loader per key so invalidations and the
//! background refresh can re-run it without the caller.

use crate::error::CacheResult;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces the current value for a cache key.
pub trait Loader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, CacheResult<Value>>;
}

/// Loader backed by a closure returning a future.
pub struct FnLoader<F>(F);

impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = CacheResult<Value>> + Send + 'static,
{
    fn load(&self) -> BoxFuture<'_, CacheResult<Value>> {
        Box::pin((self.0)())
    }
}

/// Wrap a closure as a shareable loader.
pub fn loader_fn<F, Fut>(f: F) -> Arc<dyn Loader>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CacheResult<Value>> + Send + 'static,
{
    Arc::new(FnLoader(f))
}
