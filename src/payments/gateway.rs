use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::CircuitState;

// ============================================================================
// Payment Gateway Port
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable")]
    Unavailable,

    #[error("payment gateway request failed: {0}")]
    Request(String),

    #[error("payment gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment intent {0} not found")]
    IntentNotFound(String),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(&'static str),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
}

/// Parameters for a new payment intent. Amount is in minor units (cents).
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    /// Whether the intent can still be paid by the customer
    pub fn is_open(&self) -> bool {
        !matches!(self, IntentStatus::Succeeded | IntentStatus::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get("orderId").map(String::as_str)
    }
}

/// Verified inbound webhook event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The payment intent carried by `payment_intent.*` events
    pub fn payment_intent(&self) -> Result<PaymentIntent, GatewayError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))
    }

    pub fn failure_message(&self) -> Option<String> {
        self.data
            .object
            .pointer("/last_payment_error/message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Authenticate and parse a webhook delivery. Nothing may be trusted before this succeeds.
    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, GatewayError>;

    fn name(&self) -> &'static str;

    /// State of the breaker guarding upstream calls, if the gateway has one
    async fn circuit_state(&self) -> Option<CircuitState> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_statuses_do_not_fail_parsing() {
        let status: IntentStatus = serde_json::from_str("\"some_future_state\"").unwrap();
        assert_eq!(status, IntentStatus::Unknown);
        assert!(!IntentStatus::Succeeded.is_open());
        assert!(IntentStatus::RequiresPaymentMethod.is_open());
    }

    #[test]
    fn webhook_event_exposes_intent_and_failure() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.payment_failed",
            "data": { "object": {
                "id": "pi_1",
                "status": "requires_payment_method",
                "amount": 1000,
                "currency": "usd",
                "metadata": { "orderId": "abc" },
                "last_payment_error": { "message": "card declined" }
            }}
        }))
        .unwrap();

        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.id, "pi_1");
        assert_eq!(intent.order_id(), Some("abc"));
        assert_eq!(event.failure_message().as_deref(), Some("card declined"));
    }
}
