//! Operator commands.

use crate::error::{GatewayError, GatewayResult};
use botdeck_core::{Resource, RiskLimitsPatch, Side};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Manual order request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOrder {
    pub token_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub condition_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One operator command, sent as exactly one API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pause {
        reason: String,
    },
    Resume,
    Kill {
        reason: String,
    },
    CancelAllOrders,
    FlattenPositions {
        reason: String,
    },
    ManualOrder(ManualOrder),
    UpdateRiskLimits(RiskLimitsPatch),
    ClosePosition {
        position_id: String,
        price: Option<f64>,
        reason: Option<String>,
        token_id: Option<String>,
    },
    BlockMarket {
        condition_id: String,
        reason: String,
    },
    UnblockMarket {
        condition_id: String,
        reason: Option<String>,
    },
}

fn require_reason(reason: &str) -> GatewayResult<()> {
    if reason.trim().is_empty() {
        return Err(GatewayError::Validation("reason must not be empty".to_string()));
    }
    Ok(())
}

fn require_id(name: &str, id: &str) -> GatewayResult<()> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(GatewayError::Validation(format!("{name} is invalid: {id:?}")));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> GatewayResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GatewayError::Validation(format!(
            "{name} must be a finite number greater than 0"
        )));
    }
    Ok(())
}

fn reason_body(reason: &str) -> Value {
    json!({ "reason": reason })
}

impl Command {
    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause { .. } => "pause",
            Self::Resume => "resume",
            Self::Kill { .. } => "kill",
            Self::CancelAllOrders => "cancel_all_orders",
            Self::FlattenPositions { .. } => "flatten_positions",
            Self::ManualOrder(_) => "manual_order",
            Self::UpdateRiskLimits(_) => "update_risk_limits",
            Self::ClosePosition { .. } => "close_position",
            Self::BlockMarket { .. } => "block_market",
            Self::UnblockMarket { .. } => "unblock_market",
        }
    }

    /// Client-side checks run before the call is attempted.
    ///
    /// Risk limits are checked against the current configuration by
    /// `CommandGateway::update_risk_limits`; here only an empty patch is
    /// rejected.
    pub fn validate(&self) -> GatewayResult<()> {
        match self {
            Self::Pause { reason } | Self::Kill { reason } | Self::FlattenPositions { reason } => {
                require_reason(reason)
            }
            Self::Resume | Self::CancelAllOrders => Ok(()),
            Self::ManualOrder(order) => {
                require_positive("price", order.price)?;
                require_positive("size", order.size)?;
                if order.token_id.trim().is_empty() {
                    return Err(GatewayError::Validation("token_id must not be empty".to_string()));
                }
                Ok(())
            }
            Self::UpdateRiskLimits(patch) => {
                if patch.is_empty() {
                    return Err(GatewayError::Validation("no risk limit changes".to_string()));
                }
                Ok(())
            }
            Self::ClosePosition {
                position_id, price, ..
            } => {
                require_id("position_id", position_id)?;
                if let Some(price) = price {
                    require_positive("price", *price)?;
                }
                Ok(())
            }
            Self::BlockMarket {
                condition_id,
                reason,
            } => {
                require_id("condition_id", condition_id)?;
                require_reason(reason)
            }
            Self::UnblockMarket { condition_id, .. } => require_id("condition_id", condition_id),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::UpdateRiskLimits(_) => Method::PUT,
            _ => Method::POST,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Pause { .. } => "/api/control/pause".to_string(),
            Self::Resume => "/api/control/resume".to_string(),
            Self::Kill { .. } => "/api/control/kill".to_string(),
            Self::CancelAllOrders => "/api/orders/cancel-all".to_string(),
            Self::FlattenPositions { .. } => "/api/positions/flatten".to_string(),
            Self::ManualOrder(_) => "/api/orders/manual".to_string(),
            Self::UpdateRiskLimits(_) => "/api/risk/limits".to_string(),
            Self::ClosePosition { position_id, .. } => {
                format!("/api/positions/{position_id}/close")
            }
            Self::BlockMarket { condition_id, .. } => {
                format!("/api/markets/{condition_id}/block")
            }
            Self::UnblockMarket { condition_id, .. } => {
                format!("/api/markets/{condition_id}/unblock")
            }
        }
    }

    /// Request body in the API's snake_case shape.
    pub fn body(&self) -> GatewayResult<Option<Value>> {
        let body = match self {
            Self::Pause { reason } | Self::Kill { reason } | Self::FlattenPositions { reason } => {
                Some(reason_body(reason))
            }
            Self::BlockMarket { reason, .. } => Some(reason_body(reason)),
            Self::Resume | Self::CancelAllOrders => None,
            Self::ManualOrder(order) => Some(
                serde_json::to_value(order).map_err(|e| GatewayError::Json(e.to_string()))?,
            ),
            Self::UpdateRiskLimits(patch) => Some(
                serde_json::to_value(patch).map_err(|e| GatewayError::Json(e.to_string()))?,
            ),
            Self::ClosePosition {
                price,
                reason,
                token_id,
                ..
            } => {
                let mut body = Map::new();
                if let Some(price) = price {
                    body.insert("price".to_string(), json!(price));
                }
                if let Some(reason) = reason {
                    body.insert("reason".to_string(), json!(reason));
                }
                if let Some(token_id) = token_id {
                    body.insert("token_id".to_string(), json!(token_id));
                }
                Some(Value::Object(body))
            }
            Self::UnblockMarket { reason, .. } => Some(match reason {
                Some(reason) => reason_body(reason),
                None => json!({}),
            }),
        };
        Ok(body)
    }

    /// Cache families a caller invalidates after the command succeeds.
    pub fn affected_resources(&self) -> &'static [Resource] {
        match self {
            Self::Pause { .. } | Self::Resume | Self::Kill { .. } => {
                &[Resource::BotStatus, Resource::Activity]
            }
            Self::CancelAllOrders => &[Resource::Orders, Resource::Metrics, Resource::Activity],
            Self::FlattenPositions { .. } | Self::ClosePosition { .. } => &[
                Resource::Positions,
                Resource::Performance,
                Resource::Metrics,
                Resource::Risk,
                Resource::Activity,
            ],
            Self::ManualOrder(_) => &[
                Resource::Orders,
                Resource::Positions,
                Resource::Metrics,
                Resource::Activity,
            ],
            Self::UpdateRiskLimits(_) => &[Resource::Risk, Resource::Activity],
            Self::BlockMarket { .. } | Self::UnblockMarket { .. } => &[
                Resource::Markets,
                Resource::MarketDetail,
                Resource::Activity,
            ],
        }
    }
}
