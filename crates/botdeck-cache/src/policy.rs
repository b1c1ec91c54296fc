//! Freshness and refresh tuning per resource family.

use botdeck_core::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default number of retries after a failed load.
const DEFAULT_RETRY_COUNT: u32 = 2;

/// Default base delay between retries.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for the retry delay.
const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Options for one fetch or observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Age below which a cached value is served without a load.
    pub stale_time: Duration,
    /// Background refetch cadence while the key is observed (None = never).
    pub refresh_interval: Option<Duration>,
    /// Retries after the first failed attempt.
    pub retry_count: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay: Duration,
    /// Maximum retry delay.
    pub retry_max_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(15),
            refresh_interval: Some(Duration::from_secs(30)),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl FetchOptions {
    fn secs(stale: u64, refresh: u64) -> Self {
        Self {
            stale_time: Duration::from_secs(stale),
            refresh_interval: Some(Duration::from_secs(refresh)),
            ..Default::default()
        }
    }

    /// Built-in tuning for a resource family.
    ///
    /// Operator-critical state (status, metrics, positions) refreshes faster
    /// than slow-moving configuration.
    pub fn for_resource(resource: Resource) -> Self {
        match resource {
            Resource::BotStatus => Self::secs(10, 15),
            Resource::Metrics => Self::secs(15, 30),
            Resource::Positions | Resource::Orders => Self::secs(15, 30),
            Resource::Risk => Self::secs(30, 30),
            Resource::Activity => Self::secs(10, 15),
            Resource::Markets => Self::secs(30, 60),
            Resource::MarketDetail => Self::secs(15, 30),
            Resource::MarketHistory => Self::secs(60, 60),
            Resource::MarketOrderbook => Self::secs(5, 10),
            Resource::Performance => Self::secs(60, 60),
            Resource::SystemConfig => Self::secs(60, 60),
            Resource::Logs => Self::secs(15, 30),
            Resource::Strategy => Self::secs(60, 60),
            Resource::Decisions => Self::secs(30, 30),
            Resource::PipelineFunnel
            | Resource::PipelineRejections
            | Resource::PipelineCandidates
            | Resource::NearMisses => Self::secs(30, 60),
        }
    }

    /// Retry delay before attempt `attempt + 1`: base * 2^(attempt-1), capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self.retry_base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.retry_max_delay)
    }

    /// Options for a one-shot read that must not use the cached value.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.stale_time = Duration::ZERO;
        self
    }
}

/// Per-resource override as written in configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTuning {
    #[serde(default)]
    pub stale_time_ms: Option<u64>,
    /// 0 disables background refresh.
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    #[serde(default)]
    pub retry_count: Option<u32>,
}

impl ResourceTuning {
    fn apply(&self, mut options: FetchOptions) -> FetchOptions {
        if let Some(ms) = self.stale_time_ms {
            options.stale_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.refresh_interval_ms {
            options.refresh_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(n) = self.retry_count {
            options.retry_count = n;
        }
        options
    }
}

/// Resolves fetch options for every resource family.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    overrides: HashMap<Resource, ResourceTuning>,
}

impl CachePolicy {
    pub fn new(overrides: HashMap<Resource, ResourceTuning>) -> Self {
        Self { overrides }
    }

    pub fn options_for(&self, resource: Resource) -> FetchOptions {
        let base = FetchOptions::for_resource(resource);
        match self.overrides.get(&resource) {
            Some(tuning) => tuning.apply(base),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_refreshes_faster_than_config() {
        let status = FetchOptions::for_resource(Resource::BotStatus);
        let metrics = FetchOptions::for_resource(Resource::Metrics);
        let config = FetchOptions::for_resource(Resource::SystemConfig);
        assert!(status.refresh_interval < config.refresh_interval);
        assert!(metrics.refresh_interval < config.refresh_interval);
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_retry_delay_is_bounded() {
        let options = FetchOptions::default();
        assert_eq!(options.retry_delay(1), Duration::from_millis(1000));
        assert_eq!(options.retry_delay(2), Duration::from_millis(2000));
        assert_eq!(options.retry_delay(3), Duration::from_millis(4000));
        assert_eq!(options.retry_delay(20), Duration::from_millis(30_000));
    }

    #[test]
    fn test_policy_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            Resource::Logs,
            ResourceTuning {
                stale_time_ms: Some(500),
                refresh_interval_ms: Some(0),
                retry_count: Some(0),
            },
        );
        let policy = CachePolicy::new(overrides);
        let logs = policy.options_for(Resource::Logs);
        assert_eq!(logs.stale_time, Duration::from_millis(500));
        assert_eq!(logs.refresh_interval, None);
        assert_eq!(logs.retry_count, 0);
        assert_eq!(
            policy.options_for(Resource::Orders),
            FetchOptions::for_resource(Resource::Orders)
        );
    }
}
