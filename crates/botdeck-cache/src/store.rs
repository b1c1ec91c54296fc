//! Cache store.
//!
//! Entries are created on first read and hold the last good value, the fetch
//! time, the last error and the loader that produced them. Loads for one key
//! are serialized by a per-entry async mutex; readers never wait on it.
//!
//! Invalidation bumps the entry generation. A value is fresh only when it was
//! fetched for the current generation and is younger than the stale time, so
//! an invalidation that lands while a load is in flight still forces one more
//! load afterwards. Scheduled refetches are coalesced: at most one is pending
//! per key.

use crate::error::{CacheError, CacheResult};
use crate::loader::Loader;
use crate::policy::{CachePolicy, FetchOptions};
use botdeck_core::CacheKey;
use botdeck_telemetry::Metrics;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Point-in-time view of one entry, as seen by observers.
#[derive(Debug, Clone, Default)]
pub struct EntrySnapshot {
    /// Last good value.
    pub value: Option<Arc<Value>>,
    /// Error from the most recent failed load (cleared on success).
    pub error: Option<String>,
    /// When the last good value was fetched.
    pub fetched_at: Option<Instant>,
    /// A load is in flight.
    pub is_fetching: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    /// Skip the load when the value is fresh once the load lock is held.
    IfStale,
    /// Always load (background refresh tick).
    Always,
}

struct EntryState {
    value: Option<Arc<Value>>,
    fetched_at: Option<Instant>,
    /// Generation the current value was fetched for.
    fetched_generation: u64,
    generation: u64,
    error: Option<String>,
    is_fetching: bool,
    last_access: Instant,
    observers: usize,
    loader: Option<Arc<dyn Loader>>,
    options: FetchOptions,
    refresh_cancel: Option<CancellationToken>,
}

impl EntryState {
    fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
        self.value.is_some()
            && self.fetched_generation == self.generation
            && self
                .fetched_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time)
    }
}

struct Entry {
    key: CacheKey,
    state: Mutex<EntryState>,
    load_lock: TokioMutex<()>,
    refetch_scheduled: AtomicBool,
    tx: watch::Sender<EntrySnapshot>,
}

impl Entry {
    fn new(key: CacheKey, options: FetchOptions) -> Self {
        let (tx, _rx) = watch::channel(EntrySnapshot::default());
        Self {
            key,
            state: Mutex::new(EntryState {
                value: None,
                fetched_at: None,
                fetched_generation: 0,
                generation: 0,
                error: None,
                is_fetching: false,
                last_access: Instant::now(),
                observers: 0,
                loader: None,
                options,
                refresh_cancel: None,
            }),
            load_lock: TokioMutex::new(()),
            refetch_scheduled: AtomicBool::new(false),
            tx,
        }
    }

    fn snapshot(&self) -> EntrySnapshot {
        let st = self.state.lock();
        EntrySnapshot {
            value: st.value.clone(),
            error: st.error.clone(),
            fetched_at: st.fetched_at,
            is_fetching: st.is_fetching,
        }
    }

    /// Push the current snapshot to observers. Must not be called with the
    /// state lock held.
    fn publish(&self) {
        let snapshot = self.snapshot();
        self.tx.send_replace(snapshot);
    }

    fn fresh_value(&self, stale_time: Duration) -> Option<Arc<Value>> {
        let mut st = self.state.lock();
        let now = Instant::now();
        st.last_access = now;
        if st.is_fresh(stale_time, now) {
            st.value.clone()
        } else {
            None
        }
    }

    fn loader_and_options(&self) -> Option<(Arc<dyn Loader>, FetchOptions)> {
        let st = self.state.lock();
        st.loader.clone().map(|l| (l, st.options.clone()))
    }

    fn resource_label(&self) -> &'static str {
        self.key.resource().as_str()
    }
}

struct StoreInner {
    entries: DashMap<CacheKey, Arc<Entry>>,
    policy: CachePolicy,
}

/// Shared cache of server-derived values.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl CacheStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                policy,
            }),
        }
    }

    /// Fetch options for a key according to the store policy.
    pub fn options_for(&self, key: &CacheKey) -> FetchOptions {
        self.inner.policy.options_for(key.resource())
    }

    fn entry_for(&self, key: &CacheKey, options: &FetchOptions) -> Arc<Entry> {
        let entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Entry::new(key.clone(), options.clone())));
        Arc::clone(entry.value())
    }

    fn existing(&self, key: &CacheKey) -> Option<Arc<Entry>> {
        self.inner.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Most recent known value, without loading.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        let entry = self.existing(key)?;
        let mut st = entry.state.lock();
        st.last_access = Instant::now();
        st.value.clone()
    }

    /// Most recent known value decoded into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Option<T>> {
        match self.get(key) {
            Some(value) => serde_json::from_value(Value::clone(&value))
                .map(Some)
                .map_err(|e| CacheError::Decode {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Value, last error and fetching flag for a key.
    pub fn snapshot(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.existing(key).map(|entry| entry.snapshot())
    }

    /// Return the cached value if fresh, otherwise load it.
    ///
    /// Concurrent fetches of one key share a single load. On failure after
    /// all retries the previous value stays readable through `get` and the
    /// error is recorded on the entry.
    pub async fn fetch(
        &self,
        key: &CacheKey,
        loader: Arc<dyn Loader>,
        options: FetchOptions,
    ) -> CacheResult<Arc<Value>> {
        let entry = self.entry_for(key, &options);
        {
            let mut st = entry.state.lock();
            st.loader = Some(Arc::clone(&loader));
            if st.observers == 0 {
                st.options = options.clone();
            }
        }

        if let Some(value) = entry.fresh_value(options.stale_time) {
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        Self::load(&entry, loader, &options, LoadMode::IfStale).await
    }

    /// Fetch using the store policy for the key's resource.
    pub async fn fetch_default(
        &self,
        key: &CacheKey,
        loader: Arc<dyn Loader>,
    ) -> CacheResult<Arc<Value>> {
        let options = self.options_for(key);
        self.fetch(key, loader, options).await
    }

    /// Register an observer for a key.
    ///
    /// While at least one observation is alive the store refetches the key
    /// every `refresh_interval` and refetches immediately on invalidation.
    /// A load is started right away if the cached value is missing or stale.
    pub fn observe(
        &self,
        key: &CacheKey,
        loader: Arc<dyn Loader>,
        options: FetchOptions,
    ) -> Observation {
        let entry = self.entry_for(key, &options);
        let refresh = {
            let mut st = entry.state.lock();
            st.observers += 1;
            st.loader = Some(loader);
            if st.observers == 1 {
                st.options = options.clone();
                match options.refresh_interval {
                    Some(interval) if !interval.is_zero() => {
                        let token = CancellationToken::new();
                        st.refresh_cancel = Some(token.clone());
                        Some((interval, token))
                    }
                    _ => None,
                }
            } else {
                None
            }
        };

        if let Some((interval, token)) = refresh {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(refresh_loop(Arc::clone(&entry), interval, token));
                }
                Err(_) => warn!(key = %key, "No async runtime, background refresh disabled"),
            }
        }

        if entry.fresh_value(options.stale_time).is_none() {
            schedule_refetch(&entry);
        }

        let rx = entry.tx.subscribe();
        debug!(key = %key, "Observer registered");
        Observation { entry, rx }
    }

    /// Observe using the store policy for the key's resource.
    pub fn observe_default(&self, key: &CacheKey, loader: Arc<dyn Loader>) -> Observation {
        let options = self.options_for(key);
        self.observe(key, loader, options)
    }

    /// Mark every entry matched by `key` stale.
    ///
    /// Observed entries refetch in the background; unobserved ones reload on
    /// their next `fetch`. Returns the number of entries marked.
    pub fn invalidate(&self, key: &CacheKey) -> usize {
        Metrics::cache_invalidated(key.resource().as_str());
        let matched: Vec<Arc<Entry>> = self
            .inner
            .entries
            .iter()
            .filter(|e| key.matches(e.key()))
            .map(|e| Arc::clone(e.value()))
            .collect();
        for entry in &matched {
            Self::mark_stale(entry);
        }
        debug!(key = %key, entries = matched.len(), "Invalidated");
        matched.len()
    }

    /// Mark every entry stale.
    pub fn invalidate_all(&self) -> usize {
        let all: Vec<Arc<Entry>> = self
            .inner
            .entries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for entry in &all {
            Metrics::cache_invalidated(entry.resource_label());
            Self::mark_stale(entry);
        }
        debug!(entries = all.len(), "Invalidated all entries");
        all.len()
    }

    fn mark_stale(entry: &Arc<Entry>) {
        let observed = {
            let mut st = entry.state.lock();
            st.generation += 1;
            st.observers > 0
        };
        if observed {
            schedule_refetch(entry);
        }
    }

    /// Drop unobserved entries not read within `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| {
            let st = entry.state.lock();
            st.observers > 0 || now.saturating_duration_since(st.last_access) < max_idle
        });
        before - self.inner.entries.len()
    }

    /// Keys currently held by the store.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    async fn load(
        entry: &Arc<Entry>,
        loader: Arc<dyn Loader>,
        options: &FetchOptions,
        mode: LoadMode,
    ) -> CacheResult<Arc<Value>> {
        let _guard = entry.load_lock.lock().await;
        entry.refetch_scheduled.store(false, Ordering::SeqCst);

        if mode == LoadMode::IfStale {
            if let Some(value) = entry.fresh_value(options.stale_time) {
                return Ok(value);
            }
        }

        let generation = {
            let mut st = entry.state.lock();
            st.is_fetching = true;
            st.generation
        };
        entry.publish();

        let result = load_with_retry(entry, loader.as_ref(), options).await;

        let outcome = {
            let mut st = entry.state.lock();
            st.is_fetching = false;
            match result {
                Ok(value) => {
                    let value = Arc::new(value);
                    st.value = Some(Arc::clone(&value));
                    st.fetched_at = Some(Instant::now());
                    st.fetched_generation = generation;
                    st.error = None;
                    Ok(value)
                }
                Err(e) => {
                    st.error = Some(e.to_string());
                    Err(e)
                }
            }
        };
        entry.publish();
        outcome
    }
}

async fn load_with_retry(
    entry: &Entry,
    loader: &dyn Loader,
    options: &FetchOptions,
) -> CacheResult<Value> {
    let resource = entry.resource_label();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match loader.load().await {
            Ok(value) => {
                Metrics::cache_load(resource, "ok");
                return Ok(value);
            }
            Err(e) if attempt <= options.retry_count => {
                Metrics::cache_load(resource, "retry");
                let delay = options.retry_delay(attempt);
                warn!(
                    key = %entry.key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Load failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                Metrics::cache_load(resource, "error");
                warn!(key = %entry.key, attempts = attempt, error = %e, "Load failed");
                return Err(CacheError::LoadFailed {
                    key: entry.key.to_string(),
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Spawn a stale-only refetch unless one is already pending.
fn schedule_refetch(entry: &Arc<Entry>) {
    if entry.refetch_scheduled.swap(true, Ordering::SeqCst) {
        return;
    }
    let Some((loader, options)) = entry.loader_and_options() else {
        entry.refetch_scheduled.store(false, Ordering::SeqCst);
        return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        entry.refetch_scheduled.store(false, Ordering::SeqCst);
        debug!(key = %entry.key, "No async runtime, refetch deferred to next fetch");
        return;
    };
    let entry = Arc::clone(entry);
    handle.spawn(async move {
        if let Err(e) = CacheStore::load(&entry, loader, &options, LoadMode::IfStale).await {
            debug!(key = %entry.key, error = %e, "Background refetch failed");
        }
    });
}

async fn refresh_loop(entry: Arc<Entry>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!(key = %entry.key, "Background refresh stopped");
                return;
            }
            _ = ticker.tick() => {
                let Some((loader, options)) = entry.loader_and_options() else {
                    continue;
                };
                if let Err(e) = CacheStore::load(&entry, loader, &options, LoadMode::Always).await {
                    debug!(key = %entry.key, error = %e, "Background refresh failed");
                }
            }
        }
    }
}

/// Live registration of one observer. Dropping it unregisters the observer.
pub struct Observation {
    entry: Arc<Entry>,
    rx: watch::Receiver<EntrySnapshot>,
}

impl Observation {
    pub fn key(&self) -> &CacheKey {
        &self.entry.key
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.entry.snapshot()
    }

    /// Current value.
    pub fn value(&self) -> Option<Arc<Value>> {
        self.entry.snapshot().value
    }

    /// Wait for the next published change and return the new snapshot.
    pub async fn changed(&mut self) -> Option<EntrySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Receiver for `tokio::select!` style consumers.
    pub fn receiver(&self) -> watch::Receiver<EntrySnapshot> {
        self.rx.clone()
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        let mut st = self.entry.state.lock();
        st.observers = st.observers.saturating_sub(1);
        if st.observers == 0 {
            if let Some(token) = st.refresh_cancel.take() {
                token.cancel();
            }
        }
    }
}

/// Something that can mark cache keys stale.
///
/// The event stream router depends on this seam rather than on the store.
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, key: &CacheKey) -> usize;
    fn invalidate_all(&self) -> usize;
}

impl InvalidationSink for CacheStore {
    fn invalidate(&self, key: &CacheKey) -> usize {
        CacheStore::invalidate(self, key)
    }

    fn invalidate_all(&self) -> usize {
        CacheStore::invalidate_all(self)
    }
}
