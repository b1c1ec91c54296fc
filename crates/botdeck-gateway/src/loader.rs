//! Cache loaders for read endpoints.

use crate::casing::camelize_keys;
use crate::transport::DynTransport;
use botdeck_cache::{BoxFuture, CacheError, CacheResult, Loader};
use botdeck_core::CacheKey;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Loads a cache key from its read endpoint.
pub struct ResourceLoader {
    transport: DynTransport,
    key: CacheKey,
}

impl ResourceLoader {
    pub fn new(transport: DynTransport, key: CacheKey) -> Self {
        Self { transport, key }
    }

    /// Boxed loader ready to hand to the cache store.
    pub fn shared(transport: DynTransport, key: CacheKey) -> Arc<dyn Loader> {
        Arc::new(Self::new(transport, key))
    }

    async fn load_value(&self) -> CacheResult<Value> {
        let path = self
            .key
            .endpoint_path()
            .map_err(|e| CacheError::Loader(e.to_string()))?;
        let value = self
            .transport
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| CacheError::Loader(e.to_string()))?;
        Ok(camelize_keys(value))
    }
}

impl Loader for ResourceLoader {
    fn load(&self) -> BoxFuture<'_, CacheResult<Value>> {
        Box::pin(self.load_value())
    }
}
