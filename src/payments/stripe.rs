use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

use super::gateway::{CreateIntent, GatewayError, PaymentGateway, PaymentIntent, WebhookEvent};
use super::signature::WebhookVerifier;

// ============================================================================
// Stripe-compatible HTTP Gateway
// ============================================================================
//
// Every call goes through the circuit breaker. There are no retries: a failed
// call surfaces immediately and the order is left as it was.
//
// ============================================================================

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    verifier: WebhookVerifier,
    circuit_breaker: CircuitBreaker,
}

impl StripeGateway {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            verifier: WebhookVerifier::new(webhook_secret),
            circuit_breaker: CircuitBreaker::new(
                "payment_gateway",
                CircuitBreakerConfig {
                    failure_threshold: 5,
                    cooldown: Duration::from_secs(30),
                    success_threshold: 1,
                },
            ),
        })
    }

    async fn guarded<F>(&self, operation: F) -> Result<PaymentIntent, GatewayError>
    where
        F: std::future::Future<Output = Result<PaymentIntent, GatewayError>>,
    {
        self.circuit_breaker.call(operation).await.map_err(|e| match e {
            CircuitBreakerError::CircuitOpen => GatewayError::Unavailable,
            CircuitBreakerError::OperationFailed(inner) => inner,
        })
    }

    async fn parse(response: reqwest::Response, intent_id: Option<&str>) -> Result<PaymentIntent, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| GatewayError::Request(e.to_string()));
        }

        let detail = response.json::<ErrorBody>().await.ok().map(|b| b.error);
        if status == reqwest::StatusCode::NOT_FOUND
            || detail.as_ref().and_then(|d| d.code.as_deref()) == Some("resource_missing")
        {
            if let Some(id) = intent_id {
                return Err(GatewayError::IntentNotFound(id.to_string()));
            }
        }

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message: detail
                .and_then(|d| d.message)
                .unwrap_or_else(|| status.to_string()),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, GatewayError> {
        let mut form = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.guarded(async {
            let response = self
                .client
                .post(format!("{}/v1/payment_intents", self.api_base))
                .bearer_auth(&self.secret_key)
                .form(&form)
                .send()
                .await
                .map_err(|e| GatewayError::Request(e.to_string()))?;
            Self::parse(response, None).await
        })
        .await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.guarded(async {
            let response = self
                .client
                .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
                .bearer_auth(&self.secret_key)
                .send()
                .await
                .map_err(|e| GatewayError::Request(e.to_string()))?;
            Self::parse(response, Some(intent_id)).await
        })
        .await
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, GatewayError> {
        self.verifier.verify(payload, signature_header)?;
        serde_json::from_slice(payload).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn circuit_state(&self) -> Option<CircuitState> {
        Some(self.circuit_breaker.state().await)
    }
}
