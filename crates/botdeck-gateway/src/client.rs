//! Command gateway.

use crate::casing::camelize_keys;
use crate::command::{Command, ManualOrder};
use crate::error::{GatewayError, GatewayResult};
use crate::transport::DynTransport;
use botdeck_core::{RiskLimits, RiskLimitsPatch};
use botdeck_telemetry::Metrics;
use serde_json::Value;
use tracing::{info, warn};

/// Sends operator commands to the bot API.
///
/// The gateway validates locally, makes exactly one call and returns the
/// camelCase-normalized response. Cache invalidation after success is the
/// caller's job (see `Command::affected_resources`).
#[derive(Clone)]
pub struct CommandGateway {
    transport: DynTransport,
}

impl CommandGateway {
    pub fn new(transport: DynTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &DynTransport {
        &self.transport
    }

    /// Validate and send one command.
    pub async fn execute(&self, command: &Command) -> GatewayResult<Value> {
        let name = command.name();
        if let Err(e) = command.validate() {
            Metrics::command(name, "rejected");
            warn!(command = name, error = %e, "Command rejected locally");
            return Err(e);
        }

        let path = command.path();
        let body = command.body()?;
        info!(command = name, %path, "Sending command");

        match self.transport.request(command.method(), &path, body).await {
            Ok(value) => {
                Metrics::command(name, "ok");
                info!(command = name, "Command succeeded");
                Ok(camelize_keys(value))
            }
            Err(e) => {
                Metrics::command(name, "error");
                warn!(command = name, error = %e, "Command failed");
                Err(e)
            }
        }
    }

    pub async fn pause(&self, reason: impl Into<String>) -> GatewayResult<Value> {
        self.execute(&Command::Pause {
            reason: reason.into(),
        })
        .await
    }

    pub async fn resume(&self) -> GatewayResult<Value> {
        self.execute(&Command::Resume).await
    }

    pub async fn kill(&self, reason: impl Into<String>) -> GatewayResult<Value> {
        self.execute(&Command::Kill {
            reason: reason.into(),
        })
        .await
    }

    pub async fn cancel_all_orders(&self) -> GatewayResult<Value> {
        self.execute(&Command::CancelAllOrders).await
    }

    pub async fn flatten_positions(&self, reason: impl Into<String>) -> GatewayResult<Value> {
        self.execute(&Command::FlattenPositions {
            reason: reason.into(),
        })
        .await
    }

    pub async fn submit_manual_order(&self, order: ManualOrder) -> GatewayResult<Value> {
        self.execute(&Command::ManualOrder(order)).await
    }

    /// Validate `current` with `patch` applied, then send only the patch.
    pub async fn update_risk_limits(
        &self,
        current: &RiskLimits,
        patch: RiskLimitsPatch,
    ) -> GatewayResult<Value> {
        let errors = botdeck_risk::validate(&current.apply(&patch));
        if !errors.is_valid() {
            Metrics::command("update_risk_limits", "rejected");
            warn!(errors = %errors, "Risk limits rejected locally");
            return Err(GatewayError::InvalidRiskLimits(errors));
        }
        self.execute(&Command::UpdateRiskLimits(patch)).await
    }

    pub async fn close_position(
        &self,
        position_id: impl Into<String>,
        price: Option<f64>,
        reason: Option<String>,
        token_id: Option<String>,
    ) -> GatewayResult<Value> {
        self.execute(&Command::ClosePosition {
            position_id: position_id.into(),
            price,
            reason,
            token_id,
        })
        .await
    }

    pub async fn block_market(
        &self,
        condition_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> GatewayResult<Value> {
        self.execute(&Command::BlockMarket {
            condition_id: condition_id.into(),
            reason: reason.into(),
        })
        .await
    }

    pub async fn unblock_market(
        &self,
        condition_id: impl Into<String>,
        reason: Option<String>,
    ) -> GatewayResult<Value> {
        self.execute(&Command::UnblockMarket {
            condition_id: condition_id.into(),
            reason,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use botdeck_core::{RiskField, Side};
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn gateway() -> (CommandGateway, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        (CommandGateway::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_pause_sends_one_request() {
        let (gateway, mock) = gateway();
        gateway.pause("maintenance").await.unwrap();
        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/api/control/pause");
        assert_eq!(requests[0].body, Some(json!({"reason": "maintenance"})));
    }

    #[tokio::test]
    async fn test_empty_reason_makes_no_call() {
        let (gateway, mock) = gateway();
        let err = gateway.kill("").await.unwrap_err();
        assert!(err.is_local());
        assert!(mock.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_order_makes_no_call() {
        let (gateway, mock) = gateway();
        let err = gateway
            .submit_manual_order(ManualOrder {
                token_id: "tok".to_string(),
                side: Side::Sell,
                price: f64::NAN,
                size: 1.0,
                condition_id: "0xabc".to_string(),
                reason: Some("manual".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(mock.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_not_retried() {
        let (gateway, mock) = gateway();
        mock.set_response(
            "/api/positions/flatten",
            Err(GatewayError::Http {
                status: 503,
                body: "unavailable".to_string(),
            }),
        );
        let err = gateway.flatten_positions("eod").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(mock.count("/api/positions/flatten"), 1);
    }

    #[tokio::test]
    async fn test_response_is_camelized() {
        let (gateway, mock) = gateway();
        mock.set_response(
            "/api/orders/cancel-all",
            Ok(json!({"cancelled_count": 3, "order_ids": ["a", "b", "c"]})),
        );
        let value = gateway.cancel_all_orders().await.unwrap();
        assert_eq!(value["cancelledCount"], 3);
    }

    #[tokio::test]
    async fn test_risk_limits_validated_before_call() {
        let (gateway, mock) = gateway();
        let current = RiskLimits::default();
        let patch = RiskLimitsPatch::default().with(RiskField::StopLoss, 0.6);
        let err = gateway.update_risk_limits(&current, patch).await.unwrap_err();
        match err {
            GatewayError::InvalidRiskLimits(errors) => {
                assert!(errors.contains(RiskField::StopLoss));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(mock.get_requests().is_empty());

        let patch = RiskLimitsPatch::default().with(RiskField::StopLoss, 0.25);
        gateway.update_risk_limits(&current, patch).await.unwrap();
        let requests = mock.get_requests();
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].body, Some(json!({"stop_loss": 0.25})));
    }

    #[tokio::test]
    async fn test_unblock_without_reason() {
        let (gateway, mock) = gateway();
        gateway.unblock_market("0xabc", None).await.unwrap();
        let requests = mock.get_requests();
        assert_eq!(requests[0].path, "/api/markets/0xabc/unblock");
        assert_eq!(requests[0].body, Some(json!({})));
    }
}
