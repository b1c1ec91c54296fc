//! Resource families and cache keys.
//!
//! Every server-derived view the console displays belongs to one `Resource`
//! family. A `CacheKey` is a resource plus ordered parameters; for the
//! market-scoped families the first parameter is the market condition id.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical resource family backed by one read endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    BotStatus,
    Metrics,
    Positions,
    Orders,
    Risk,
    Activity,
    Markets,
    MarketDetail,
    MarketHistory,
    MarketOrderbook,
    Performance,
    SystemConfig,
    Logs,
    Strategy,
    Decisions,
    PipelineFunnel,
    PipelineRejections,
    PipelineCandidates,
    NearMisses,
}

impl Resource {
    /// All resource families, in display order.
    pub const ALL: [Resource; 19] = [
        Resource::BotStatus,
        Resource::Metrics,
        Resource::Positions,
        Resource::Orders,
        Resource::Risk,
        Resource::Activity,
        Resource::Markets,
        Resource::MarketDetail,
        Resource::MarketHistory,
        Resource::MarketOrderbook,
        Resource::Performance,
        Resource::SystemConfig,
        Resource::Logs,
        Resource::Strategy,
        Resource::Decisions,
        Resource::PipelineFunnel,
        Resource::PipelineRejections,
        Resource::PipelineCandidates,
        Resource::NearMisses,
    ];

    /// Stable kebab-case name (also used as metric label).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotStatus => "bot-status",
            Self::Metrics => "metrics",
            Self::Positions => "positions",
            Self::Orders => "orders",
            Self::Risk => "risk",
            Self::Activity => "activity",
            Self::Markets => "markets",
            Self::MarketDetail => "market-detail",
            Self::MarketHistory => "market-history",
            Self::MarketOrderbook => "market-orderbook",
            Self::Performance => "performance",
            Self::SystemConfig => "system-config",
            Self::Logs => "logs",
            Self::Strategy => "strategy",
            Self::Decisions => "decisions",
            Self::PipelineFunnel => "pipeline-funnel",
            Self::PipelineRejections => "pipeline-rejections",
            Self::PipelineCandidates => "pipeline-candidates",
            Self::NearMisses => "near-misses",
        }
    }

    /// Whether the endpoint is scoped to a single market (needs a condition id).
    pub fn is_market_scoped(&self) -> bool {
        matches!(
            self,
            Self::MarketDetail | Self::MarketHistory | Self::MarketOrderbook
        )
    }

    /// Read endpoint path template. `{id}` is the market condition id.
    pub fn path_template(&self) -> &'static str {
        match self {
            Self::BotStatus => "/api/status",
            Self::Metrics => "/api/metrics",
            Self::Positions => "/api/positions",
            Self::Orders => "/api/orders",
            Self::Risk => "/api/risk",
            Self::Activity => "/api/activity",
            Self::Markets => "/api/markets",
            Self::MarketDetail => "/api/markets/{id}",
            Self::MarketHistory => "/api/markets/{id}/history",
            Self::MarketOrderbook => "/api/markets/{id}/orderbook",
            Self::Performance => "/api/performance",
            Self::SystemConfig => "/api/system/config",
            Self::Logs => "/api/logs",
            Self::Strategy => "/api/strategy",
            Self::Decisions => "/api/decisions",
            Self::PipelineFunnel => "/api/pipeline/funnel",
            Self::PipelineRejections => "/api/pipeline/rejections",
            Self::PipelineCandidates => "/api/pipeline/candidates",
            Self::NearMisses => "/api/pipeline/near-misses",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::UnknownResource(s.to_string()))
    }
}

/// Identifier of one cached value.
///
/// Equal iff resource and all parameters match. A key with fewer parameters
/// *matches* (for invalidation purposes) every key of the same resource whose
/// parameters start with its own, so `CacheKey::family(r)` covers the whole
/// family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    resource: Resource,
    params: Vec<String>,
}

impl CacheKey {
    /// Key for a resource without parameters.
    pub fn family(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    /// Key for a market-scoped resource.
    pub fn market(resource: Resource, condition_id: impl Into<String>) -> Self {
        Self {
            resource,
            params: vec![condition_id.into()],
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Check whether invalidating `self` invalidates `other`.
    pub fn matches(&self, other: &CacheKey) -> bool {
        self.resource == other.resource && other.params.starts_with(&self.params)
    }

    /// Resolve the read endpoint path for this key.
    ///
    /// For market-scoped resources the first parameter fills `{id}`; every
    /// remaining parameter must be `name=value` and becomes a query pair.
    pub fn endpoint_path(&self) -> Result<String> {
        let template = self.resource.path_template();
        let (mut path, query_params) = if self.resource.is_market_scoped() {
            let id = self
                .params
                .first()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| CoreError::InvalidValue {
                    field: self.resource.as_str().to_string(),
                    value: "missing condition id".to_string(),
                })?;
            (template.replace("{id}", id), &self.params[1..])
        } else {
            (template.to_string(), &self.params[..])
        };

        let mut pairs = Vec::with_capacity(query_params.len());
        for param in query_params {
            match param.split_once('=') {
                Some((name, _)) if !name.is_empty() => pairs.push(param.as_str()),
                _ => {
                    return Err(CoreError::InvalidValue {
                        field: self.resource.as_str().to_string(),
                        value: param.clone(),
                    })
                }
            }
        }
        if !pairs.is_empty() {
            path.push('?');
            path.push_str(&pairs.join("&"));
        }
        Ok(path)
    }
}

impl From<Resource> for CacheKey {
    fn from(resource: Resource) -> Self {
        Self::family(resource)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for p in &self.params {
            write!(f, "/{p}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_names_roundtrip() {
        for r in Resource::ALL {
            assert_eq!(r.as_str().parse::<Resource>().unwrap(), r);
        }
        assert!("nope".parse::<Resource>().is_err());
    }

    #[test]
    fn test_key_equality() {
        let a = CacheKey::market(Resource::MarketDetail, "0xabc");
        let b = CacheKey::market(Resource::MarketDetail, "0xabc");
        let c = CacheKey::market(Resource::MarketDetail, "0xdef");
        let d = CacheKey::market(Resource::MarketHistory, "0xabc");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_family_matches_parameterized_keys() {
        let family = CacheKey::family(Resource::MarketDetail);
        let key = CacheKey::market(Resource::MarketDetail, "0xabc");
        assert!(family.matches(&key));
        assert!(!key.matches(&family));
        assert!(!family.matches(&CacheKey::market(Resource::MarketHistory, "0xabc")));
        assert!(key.matches(&key.clone()));
    }

    #[test]
    fn test_endpoint_path() {
        assert_eq!(
            CacheKey::family(Resource::Positions).endpoint_path().unwrap(),
            "/api/positions"
        );
        assert_eq!(
            CacheKey::market(Resource::MarketHistory, "0xabc")
                .with_param("range=1d")
                .endpoint_path()
                .unwrap(),
            "/api/markets/0xabc/history?range=1d"
        );
        assert_eq!(
            CacheKey::family(Resource::Logs)
                .with_param("limit=200")
                .endpoint_path()
                .unwrap(),
            "/api/logs?limit=200"
        );
    }

    #[test]
    fn test_endpoint_path_requires_condition_id() {
        assert!(CacheKey::family(Resource::MarketDetail)
            .endpoint_path()
            .is_err());
        assert!(CacheKey::family(Resource::Logs)
            .with_param("garbage")
            .endpoint_path()
            .is_err());
    }

    #[test]
    fn test_display() {
        let key = CacheKey::market(Resource::MarketOrderbook, "0x1");
        assert_eq!(key.to_string(), "market-orderbook/0x1");
    }
}
