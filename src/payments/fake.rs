use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::gateway::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent, WebhookEvent,
};
use super::signature::WebhookVerifier;

/// In-process gateway for development and tests. Intents live in memory and
/// their status is driven by the caller.
pub struct FakeGateway {
    intents: RwLock<HashMap<String, PaymentIntent>>,
    verifier: WebhookVerifier,
    unavailable: AtomicBool,
}

impl FakeGateway {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            intents: RwLock::new(HashMap::new()),
            verifier: WebhookVerifier::new(webhook_secret),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<PaymentIntent, GatewayError> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))?;
        intent.status = status;
        Ok(intent.clone())
    }

    pub async fn intent_count(&self) -> usize {
        self.intents.read().await.len()
    }

    /// Signature header for `payload`, as the real gateway would send it
    pub fn sign_webhook(&self, payload: &[u8]) -> String {
        self.verifier.sign(payload, Utc::now().timestamp())
    }

    fn ensure_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, GatewayError> {
        self.ensure_available()?;

        let id = format!("pi_fake_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount: request.amount_minor,
            currency: request.currency,
            metadata: request.metadata,
        };

        self.intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.ensure_available()?;

        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, GatewayError> {
        self.verifier.verify(payload, signature_header)?;
        serde_json::from_slice(payload).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
