//! Console application wiring.
//!
//! `Console` owns the one shared cache store and connects it to the read
//! endpoints, the push stream and the command gateway. Guarded commands are
//! only ever run through the confirmation workflow; on success the affected
//! cache families are invalidated.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use botdeck_cache::{CacheError, CacheStore, InvalidationSink, Loader, Observation};
use botdeck_confirm::presets;
use botdeck_confirm::{action_fn, Action, ConfirmationWorkflow, Notifier};
use botdeck_core::{BotMode, BotStatus, CacheKey, Order, Position, Resource, RiskLimits, RiskLimitsPatch};
use botdeck_gateway::{
    stream_url, ApiKey, Command, CommandGateway, DynTransport, HttpTransport, ResourceLoader,
};
use botdeck_stream::{EventStreamHandle, StreamConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Interval of the idle-entry pruning task.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Operator console.
pub struct Console {
    config: AppConfig,
    store: CacheStore,
    transport: DynTransport,
    gateway: CommandGateway,
    workflow: Arc<ConfirmationWorkflow>,
}

impl Console {
    /// Create a console talking HTTP to `config.api.base_url`.
    pub fn new(
        config: AppConfig,
        api_key: Option<ApiKey>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let authenticated = api_key.is_some();
        let transport =
            HttpTransport::with_timeout(config.api.base_url.clone(), api_key, config.api.timeout())?;
        info!(
            base_url = %config.api.base_url,
            authenticated,
            "HTTP transport ready"
        );
        Self::with_transport(config, Arc::new(transport), notifier)
    }

    /// Create a console over an injected transport.
    pub fn with_transport(
        config: AppConfig,
        transport: DynTransport,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let store = CacheStore::new(config.cache.policy()?);
        let gateway = CommandGateway::new(Arc::clone(&transport));
        // Strictest confirmation until the bot reports its mode.
        let workflow = Arc::new(ConfirmationWorkflow::new(BotMode::Live, notifier));
        Ok(Self {
            config,
            store,
            transport,
            gateway,
            workflow,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn gateway(&self) -> &CommandGateway {
        &self.gateway
    }

    pub fn workflow(&self) -> &Arc<ConfirmationWorkflow> {
        &self.workflow
    }

    pub fn loader(&self, key: &CacheKey) -> Arc<dyn Loader> {
        ResourceLoader::shared(Arc::clone(&self.transport), key.clone())
    }

    /// Read through the cache with the configured policy.
    pub async fn fetch(&self, key: &CacheKey) -> AppResult<Arc<Value>> {
        Ok(self.store.fetch_default(key, self.loader(key)).await?)
    }

    /// Like `fetch`, but falls back to the last good value when the load
    /// fails after retries.
    pub async fn fetch_or_cached(&self, key: &CacheKey) -> AppResult<Arc<Value>> {
        match self.fetch(key).await {
            Err(AppError::Cache(err @ CacheError::LoadFailed { .. })) => match self.store.get(key) {
                Some(value) => {
                    warn!(%key, error = %err, "Refresh failed, using last known value");
                    Ok(value)
                }
                None => Err(err.into()),
            },
            other => other,
        }
    }

    /// Keep `key` fresh while the returned observation lives.
    pub fn observe(&self, key: &CacheKey) -> Observation {
        self.store.observe_default(key, self.loader(key))
    }

    /// Current bot status. Also updates the confirmation mode.
    pub async fn bot_status(&self) -> AppResult<BotStatus> {
        let value = self.fetch(&CacheKey::family(Resource::BotStatus)).await?;
        let status: BotStatus = decode(Resource::BotStatus, &value)?;
        self.workflow.set_mode(status.mode);
        Ok(status)
    }

    pub async fn refresh_mode(&self) -> AppResult<BotMode> {
        Ok(self.bot_status().await?.mode)
    }

    /// Mode for a guarded request. An unreadable status falls back to
    /// `Live` so the dialog still opens with the strictest gating.
    async fn mode_for_request(&self) -> BotMode {
        match self.refresh_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "Bot status unavailable, assuming live mode");
                self.workflow.set_mode(BotMode::Live);
                BotMode::Live
            }
        }
    }

    /// Positions for a dialog's consequences, stale if need be.
    async fn positions_for_request(&self) -> AppResult<Vec<Position>> {
        let value = self
            .fetch_or_cached(&CacheKey::family(Resource::Positions))
            .await?;
        decode_list(Resource::Positions, &value, "positions")
    }

    async fn orders_for_request(&self) -> AppResult<Vec<Order>> {
        let value = self
            .fetch_or_cached(&CacheKey::family(Resource::Orders))
            .await?;
        decode_list(Resource::Orders, &value, "orders")
    }

    pub async fn positions(&self) -> AppResult<Vec<Position>> {
        let value = self.fetch(&CacheKey::family(Resource::Positions)).await?;
        decode_list(Resource::Positions, &value, "positions")
    }

    pub async fn orders(&self) -> AppResult<Vec<Order>> {
        let value = self.fetch(&CacheKey::family(Resource::Orders)).await?;
        decode_list(Resource::Orders, &value, "orders")
    }

    pub async fn risk_limits(&self) -> AppResult<RiskLimits> {
        let value = self.fetch(&CacheKey::family(Resource::Risk)).await?;
        let limits = value.get("limits").unwrap_or(&value);
        decode(Resource::Risk, limits)
    }

    /// Open the push stream, routing its events into the store.
    pub fn open_stream(&self, api_key: Option<&ApiKey>) -> AppResult<EventStreamHandle> {
        let mut config: StreamConfig = self.config.stream.clone();
        config.url = stream_url(&config.url, api_key)?;
        let sink: Arc<dyn InvalidationSink> = Arc::new(self.store.clone());
        Ok(EventStreamHandle::open(config, sink)?)
    }

    /// Invalidate every family a successful `command` affects.
    pub fn invalidate_after(&self, command: &Command) -> usize {
        invalidate_families(&self.store, command)
    }

    /// Run a command that needs no confirmation.
    pub async fn run_command(&self, command: &Command) -> AppResult<Value> {
        let value = self.gateway.execute(command).await?;
        self.invalidate_after(command);
        Ok(value)
    }

    /// Wrap `command` as a workflow action.
    pub fn guarded_action(&self, command: Command) -> Action {
        let gateway = self.gateway.clone();
        let store = self.store.clone();
        action_fn(move || async move {
            let value = gateway
                .execute(&command)
                .await
                .map_err(|e| e.to_string())?;
            invalidate_families(&store, &command);
            Ok(value)
        })
    }

    /// Ask for confirmation to flatten all positions.
    pub async fn request_flatten(&self, reason: impl Into<String>) -> AppResult<Uuid> {
        self.mode_for_request().await;
        let positions = self.positions_for_request().await?;
        let action = self.guarded_action(Command::FlattenPositions {
            reason: reason.into(),
        });
        Ok(self
            .workflow
            .request(presets::flatten_positions(&positions, action))?)
    }

    pub async fn request_cancel_all(&self) -> AppResult<Uuid> {
        self.mode_for_request().await;
        let open = self.orders_for_request().await?.iter().filter(|o| o.is_open()).count();
        let action = self.guarded_action(Command::CancelAllOrders);
        Ok(self
            .workflow
            .request(presets::cancel_all_orders(open, action))?)
    }

    pub async fn request_kill(&self, reason: impl Into<String>) -> AppResult<Uuid> {
        self.mode_for_request().await;
        let action = self.guarded_action(Command::Kill {
            reason: reason.into(),
        });
        Ok(self.workflow.request(presets::kill_switch(action))?)
    }

    pub async fn request_close_position(
        &self,
        position_id: &str,
        price: Option<f64>,
        reason: Option<String>,
    ) -> AppResult<Uuid> {
        self.mode_for_request().await;
        let positions = self.positions_for_request().await?;
        let position = positions
            .iter()
            .find(|p| p.id == position_id)
            .ok_or_else(|| AppError::NotFound(format!("position {position_id}")))?;
        let action = self.guarded_action(Command::ClosePosition {
            position_id: position.id.clone(),
            price,
            reason,
            token_id: position.token_id.clone(),
        });
        Ok(self
            .workflow
            .request(presets::close_position(position, action))?)
    }

    /// Validate `patch` against the current limits and save it.
    pub async fn update_risk_limits(&self, patch: RiskLimitsPatch) -> AppResult<Value> {
        let current = self.risk_limits().await?;
        let value = self.gateway.update_risk_limits(&current, patch.clone()).await?;
        self.invalidate_after(&Command::UpdateRiskLimits(patch));
        Ok(value)
    }

    /// Periodically drop unobserved entries idle longer than configured.
    ///
    /// Returns `None` when pruning is disabled.
    pub fn spawn_maintenance(&self, token: CancellationToken) -> Option<JoinHandle<()>> {
        let max_idle = Duration::from_secs(self.config.cache.prune_idle_secs);
        if max_idle.is_zero() {
            return None;
        }
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let pruned = store.prune_idle(max_idle);
                        if pruned > 0 {
                            debug!(pruned, remaining = store.len(), "Pruned idle cache entries");
                        }
                    }
                }
            }
        }))
    }
}

fn invalidate_families(store: &CacheStore, command: &Command) -> usize {
    let marked: usize = command
        .affected_resources()
        .iter()
        .map(|resource| store.invalidate(&CacheKey::family(*resource)))
        .sum();
    debug!(command = command.name(), marked, "Invalidated after command");
    marked
}

fn decode<T: DeserializeOwned>(resource: Resource, value: &Value) -> AppResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| AppError::Payload {
        resource: resource.to_string(),
        message: e.to_string(),
    })
}

/// Decode a list payload: either a bare array or `{ <field>: [...] }`.
fn decode_list<T: DeserializeOwned>(
    resource: Resource,
    value: &Value,
    field: &str,
) -> AppResult<Vec<T>> {
    match value {
        Value::Array(_) => decode(resource, value),
        Value::Object(map) => match map.get(field) {
            Some(list) => decode(resource, list),
            None => {
                warn!(%resource, field, "List field missing, treating as empty");
                Ok(Vec::new())
            }
        },
        Value::Null => Ok(Vec::new()),
        other => Err(AppError::Payload {
            resource: resource.to_string(),
            message: format!("expected a list, got {other}"),
        }),
    }
}
