use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::core::{to_minor_units, MoneyError};
use crate::domain::order::{
    CommandOutcome, Order, OrderCommand, OrderCommandHandler, OrderError, OrderHandlerError,
    PaymentMethod, PaymentSource, PaymentStatus,
};
use crate::mail::Notifier;
use crate::metrics::Metrics;
use crate::store::Filter;
use crate::utils::CircuitState;

use super::gateway::{CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent};

// ============================================================================
// Payment Service
// ============================================================================
//
// Card payments: intent creation, client confirmation and webhook delivery.
// The order only changes after the gateway has been asked (confirmation) or
// the webhook signature has been verified; success side effects (metrics,
// email) fire only when the command actually moved the order to paid.
//
// ============================================================================

pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Order(#[from] OrderHandlerError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("No order is associated with payment intent {0}")]
    UnknownIntent(String),

    #[error("Payment has not succeeded (status: {0:?})")]
    NotSucceeded(IntentStatus),

    #[error("Payment amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: i64, actual: i64 },
}

impl From<OrderError> for PaymentError {
    fn from(e: OrderError) -> Self {
        PaymentError::Order(OrderHandlerError::Rule(e))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentCreated {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// What a verified webhook delivery did
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The order moved to a new payment state
    Applied { order_id: Uuid },
    /// Redelivery or out-of-order event; the order already reflects it
    AlreadyApplied { order_id: Uuid },
    /// No order carries this intent
    UnknownIntent(String),
    /// The event conflicts with the order (e.g. a superseded intent)
    Skipped { order_id: Uuid, reason: String },
    /// Event type we do not act on
    Ignored(String),
}

#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    orders: OrderCommandHandler,
    notifier: Notifier,
    metrics: Arc<Metrics>,
    currency: String,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: OrderCommandHandler,
        notifier: Notifier,
        metrics: Arc<Metrics>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            orders,
            notifier,
            metrics,
            currency: currency.into().to_lowercase(),
        }
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Look up the order a client-side intent belongs to
    pub async fn order_for_intent(&self, intent_id: &str) -> Result<Order, PaymentError> {
        self.orders
            .orders()
            .find_one(vec![Filter::eq("paymentIntentId", intent_id)])
            .await
            .map_err(OrderHandlerError::from)?
            .ok_or_else(|| PaymentError::UnknownIntent(intent_id.to_string()))
    }

    /// Create (or reuse) the gateway intent for a card order
    pub async fn create_intent(&self, order: &Order, actor_id: Option<Uuid>) -> Result<IntentCreated, PaymentError> {
        if order.payment_method != PaymentMethod::Card {
            return Err(OrderError::WrongPaymentMethod(order.payment_method).into());
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(OrderError::AlreadyPaid.into());
        }

        let amount_minor = to_minor_units(order.total_amount)?;

        // An open intent for the same amount is handed back instead of creating a second one
        if let Some(existing_id) = &order.payment_intent_id {
            if let Some(reused) = self.reuse_intent(order.id, existing_id, amount_minor, actor_id).await? {
                return Ok(reused);
            }
        }

        let request = CreateIntent {
            amount_minor,
            currency: self.currency.clone(),
            metadata: HashMap::from([
                ("orderId".to_string(), order.id.to_string()),
                ("orderNumber".to_string(), order.order_number.clone()),
            ]),
        };
        let intent = self.call("create_intent", self.gateway.create_intent(request)).await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            GatewayError::Request(format!("intent {} returned without client secret", intent.id))
        })?;

        let attached = self
            .orders
            .handle(
                order.id,
                OrderCommand::AttachPaymentIntent {
                    intent_id: intent.id.clone(),
                    replaces: order.payment_intent_id.clone(),
                },
                actor_id,
            )
            .await;

        match attached {
            Ok(_) => {}
            // A concurrent request attached its intent first; everyone gets that one
            Err(OrderHandlerError::Rule(OrderError::IntentAlreadyAttached(winner))) => {
                tracing::warn!(
                    order_id = %order.id,
                    discarded = %intent.id,
                    attached = %winner,
                    "concurrent intent creation, reusing attached intent"
                );
                return self
                    .reuse_intent(order.id, &winner, amount_minor, actor_id)
                    .await?
                    .ok_or_else(|| OrderError::IntentAlreadyAttached(winner).into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            order_id = %order.id,
            intent_id = %intent.id,
            amount_minor,
            currency = %self.currency,
            "payment intent created"
        );

        Ok(IntentCreated {
            client_secret,
            payment_intent_id: intent.id,
        })
    }

    /// Hand back an attached intent while it can still be paid. An intent that
    /// already succeeded is applied to the order and reported as paid.
    async fn reuse_intent(
        &self,
        order_id: Uuid,
        intent_id: &str,
        amount_minor: i64,
        actor_id: Option<Uuid>,
    ) -> Result<Option<IntentCreated>, PaymentError> {
        match self.call("retrieve_intent", self.gateway.retrieve_intent(intent_id)).await {
            Ok(intent) if intent.status == IntentStatus::Succeeded => {
                self.apply_success(order_id, &intent, PaymentSource::Confirmation, actor_id)
                    .await?;
                Err(OrderError::AlreadyPaid.into())
            }
            Ok(intent) if intent.status.is_open() && intent.amount == amount_minor => {
                Ok(intent.client_secret.map(|client_secret| IntentCreated {
                    client_secret,
                    payment_intent_id: intent.id,
                }))
            }
            Ok(_) | Err(PaymentError::Gateway(GatewayError::IntentNotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Client-side confirmation: trust only the gateway's view of the intent
    pub async fn confirm(&self, order: &Order, intent_id: &str, actor_id: Option<Uuid>) -> Result<Order, PaymentError> {
        if order.payment_status == PaymentStatus::Paid {
            return Ok(order.clone());
        }

        let intent = self.call("retrieve_intent", self.gateway.retrieve_intent(intent_id)).await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(PaymentError::NotSucceeded(intent.status));
        }

        let outcome = self
            .apply_success(order.id, &intent, PaymentSource::Confirmation, actor_id)
            .await?;
        Ok(outcome.order)
    }

    /// Verify, parse and apply an inbound webhook delivery
    pub async fn handle_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookOutcome, PaymentError> {
        let event = match self.gateway.verify_webhook(payload, signature_header) {
            Ok(event) => event,
            Err(e) => {
                let reason = match e {
                    GatewayError::InvalidSignature(_) => "signature",
                    _ => "payload",
                };
                self.metrics.record_webhook_rejection(reason);
                tracing::warn!(error = %e, "webhook rejected");
                return Err(e.into());
            }
        };

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook received");

        match event.event_type.as_str() {
            INTENT_SUCCEEDED => {
                let intent = event.payment_intent()?;
                let Some(order) = self.order_for_webhook(&intent).await? else {
                    return Ok(self.unknown_intent(&intent.id));
                };

                let result = self
                    .apply_success(order.id, &intent, PaymentSource::Webhook, None)
                    .await;
                self.webhook_outcome(order.id, result.map(|o| o.changed()))
            }
            INTENT_FAILED => {
                let intent = event.payment_intent()?;
                let Some(order) = self.order_for_webhook(&intent).await? else {
                    return Ok(self.unknown_intent(&intent.id));
                };

                let result = self
                    .orders
                    .handle(
                        order.id,
                        OrderCommand::FailPayment {
                            intent_id: intent.id.clone(),
                            reason: event.failure_message(),
                        },
                        None,
                    )
                    .await
                    .map_err(PaymentError::from);

                if matches!(&result, Ok(outcome) if outcome.changed()) {
                    self.metrics.payments_failed.inc();
                    tracing::warn!(order_id = %order.id, intent_id = %intent.id, "card payment failed");
                }
                self.webhook_outcome(order.id, result.map(|o| o.changed()))
            }
            other => {
                tracing::debug!(event_type = other, "webhook event ignored");
                Ok(WebhookOutcome::Ignored(other.to_string()))
            }
        }
    }

    pub async fn circuit_state(&self) -> Option<CircuitState> {
        self.gateway.circuit_state().await
    }

    async fn apply_success(
        &self,
        order_id: Uuid,
        intent: &PaymentIntent,
        source: PaymentSource,
        actor_id: Option<Uuid>,
    ) -> Result<CommandOutcome, PaymentError> {
        let order = self.orders.orders().require(order_id).await.map_err(OrderHandlerError::from)?;
        let expected = to_minor_units(order.total_amount)?;
        if intent.amount != expected {
            return Err(PaymentError::AmountMismatch {
                expected,
                actual: intent.amount,
            });
        }

        let outcome = self
            .orders
            .handle(
                order_id,
                OrderCommand::ConfirmPayment {
                    intent_id: intent.id.clone(),
                    source,
                },
                actor_id,
            )
            .await?;

        if outcome.became_paid() {
            self.metrics.record_payment_confirmed(source.as_str());
            self.notifier.payment_received(&outcome.order);
            tracing::info!(
                order_id = %order_id,
                intent_id = %intent.id,
                source = source.as_str(),
                "order paid"
            );
        }

        Ok(outcome)
    }

    /// Find the order by stored intent id, falling back to the intent's
    /// `orderId` metadata when the attach step never completed
    async fn order_for_webhook(&self, intent: &PaymentIntent) -> Result<Option<Order>, PaymentError> {
        match self.order_for_intent(&intent.id).await {
            Ok(order) => return Ok(Some(order)),
            Err(PaymentError::UnknownIntent(_)) => {}
            Err(e) => return Err(e),
        }

        let Some(order_id) = intent.order_id().and_then(|id| Uuid::parse_str(id).ok()) else {
            return Ok(None);
        };
        let Some(order) = self.orders.orders().get(order_id).await.map_err(OrderHandlerError::from)? else {
            return Ok(None);
        };
        if order.payment_intent_id.is_some() {
            return Ok(Some(order));
        }

        let outcome = self
            .orders
            .handle(
                order.id,
                OrderCommand::AttachPaymentIntent {
                    intent_id: intent.id.clone(),
                    replaces: None,
                },
                None,
            )
            .await?;
        Ok(Some(outcome.order))
    }

    fn unknown_intent(&self, intent_id: &str) -> WebhookOutcome {
        tracing::warn!(intent_id, "webhook for unknown payment intent acknowledged");
        WebhookOutcome::UnknownIntent(intent_id.to_string())
    }

    /// Rule violations are acknowledged so the gateway stops redelivering;
    /// infrastructure failures propagate and the gateway will retry.
    fn webhook_outcome(&self, order_id: Uuid, result: Result<bool, PaymentError>) -> Result<WebhookOutcome, PaymentError> {
        match result {
            Ok(true) => Ok(WebhookOutcome::Applied { order_id }),
            Ok(false) => Ok(WebhookOutcome::AlreadyApplied { order_id }),
            Err(PaymentError::Order(OrderHandlerError::Rule(rule))) => {
                tracing::warn!(order_id = %order_id, reason = %rule, "webhook skipped");
                Ok(WebhookOutcome::Skipped {
                    order_id,
                    reason: rule.to_string(),
                })
            }
            Err(e @ PaymentError::AmountMismatch { .. }) => {
                tracing::error!(order_id = %order_id, error = %e, "webhook skipped");
                Ok(WebhookOutcome::Skipped {
                    order_id,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T, PaymentError>
    where
        F: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let result = call.await;

        if let Err(e) = &result {
            if !matches!(e, GatewayError::IntentNotFound(_)) {
                self.metrics.record_gateway_error(operation);
            }
            tracing::error!(operation, error = %e, "payment gateway call failed");
        }
        if let Some(state) = self.gateway.circuit_state().await {
            self.metrics.update_circuit_breaker_state(match state {
                CircuitState::Closed => 0,
                CircuitState::Open => 1,
                CircuitState::HalfOpen => 2,
            });
        }

        result.map_err(PaymentError::from)
    }
}
