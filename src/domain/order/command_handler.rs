use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::core::{Aggregate, EventEnvelope};
use crate::store::{Collection, DocumentStore, StoreError};

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load document → aggregate decides → apply events → save with
// the loaded version as expected version. On a version conflict the command
// is re-run once against fresh state; the aggregate's idempotent guards turn
// a transition another writer already made into a no-op.
//
// ============================================================================

const ORDER_NUMBER_SEQUENCE: &str = "order_number";
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum OrderHandlerError {
    #[error(transparent)]
    Rule(#[from] OrderError),

    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a command: the order after the command, and what changed
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

impl CommandOutcome {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn became_paid(&self) -> bool {
        self.events.iter().any(OrderEvent::marks_paid)
    }
}

#[derive(Clone)]
pub struct OrderCommandHandler {
    store: Arc<dyn DocumentStore>,
    orders: Collection<Order>,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            orders: Collection::new(store.clone()),
            store,
        }
    }

    pub fn orders(&self) -> &Collection<Order> {
        &self.orders
    }

    /// Human-readable, monotonic order number: `ORD-YYYYMMDD-000042`
    pub async fn next_order_number(&self) -> Result<String, StoreError> {
        let sequence = self.store.next_sequence(ORDER_NUMBER_SEQUENCE).await?;
        Ok(format!("ORD-{}-{:06}", Utc::now().format("%Y%m%d"), sequence))
    }

    /// Create a new order from a `PlaceOrder` command
    pub async fn place(
        &self,
        command: OrderCommand,
        actor_id: Option<Uuid>,
    ) -> Result<Order, OrderHandlerError> {
        let event = Order::handle_create(&command)?;
        let mut order = Order::apply_first_event(Uuid::new_v4(), &event)?;

        let correlation_id = Uuid::new_v4();
        order
            .timeline
            .push(EventEnvelope::new(1, event, correlation_id).with_actor(actor_id));

        self.orders.insert(&mut order).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            payment_method = order.payment_method.as_str(),
            item_count = order.items.len(),
            "order placed"
        );

        Ok(order)
    }

    /// Handle a command against an existing order and persist resulting events
    pub async fn handle(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        actor_id: Option<Uuid>,
    ) -> Result<CommandOutcome, OrderHandlerError> {
        let correlation_id = Uuid::new_v4();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderHandlerError::NotFound(order_id))?;

            let events = order.handle_command(&command)?;
            if events.is_empty() {
                tracing::debug!(
                    order_id = %order_id,
                    command = command.name(),
                    "command produced no events"
                );
                return Ok(CommandOutcome { order, events });
            }

            let mut sequence = order.timeline.len() as i64;
            for event in &events {
                order.apply_event(event)?;
                sequence += 1;
                order.timeline.push(
                    EventEnvelope::new(sequence, event.clone(), correlation_id).with_actor(actor_id),
                );
            }

            match self.orders.save(&mut order).await {
                Ok(()) => {
                    tracing::info!(
                        order_id = %order_id,
                        command = command.name(),
                        event_count = events.len(),
                        payment_status = order.payment_status.as_str(),
                        order_status = order.order_status.as_str(),
                        "order updated"
                    );
                    return Ok(CommandOutcome { order, events });
                }
                Err(StoreError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        order_id = %order_id,
                        command = command.name(),
                        "concurrent order update, re-running command"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{
        GuestInfo, OrderItem, OrderOwner, OrderStatus, PaymentMethod, PaymentSource, PaymentStatus,
        ShippingAddress,
    };
    use crate::store::InMemoryDocumentStore;
    use rust_decimal_macros::dec;

    fn handler() -> OrderCommandHandler {
        OrderCommandHandler::new(Arc::new(InMemoryDocumentStore::new()))
    }

    fn place_command(order_number: String) -> OrderCommand {
        OrderCommand::PlaceOrder {
            order_number,
            owner: OrderOwner::Guest(GuestInfo {
                name: "Guest".into(),
                email: "guest@example.com".into(),
                phone: None,
            }),
            items: vec![OrderItem {
                product_id: Uuid::new_v4(),
                name: "Mug".into(),
                price: dec!(8.25),
                quantity: 4,
            }],
            shipping_address: ShippingAddress {
                full_name: "Guest".into(),
                street: "1 Road".into(),
                city: "Town".into(),
                state: None,
                postal_code: "1000".into(),
                country: "NZ".into(),
                phone: None,
            },
            payment_method: PaymentMethod::Card,
        }
    }

    #[tokio::test]
    async fn order_numbers_are_monotonic() {
        let handler = handler();
        let first = handler.next_order_number().await.unwrap();
        let second = handler.next_order_number().await.unwrap();

        assert!(first.starts_with("ORD-"));
        assert!(first.ends_with("-000001"));
        assert!(second.ends_with("-000002"));
    }

    #[tokio::test]
    async fn place_persists_with_timeline() {
        let handler = handler();
        let number = handler.next_order_number().await.unwrap();
        let order = handler.place(place_command(number), None).await.unwrap();

        let stored = handler.orders().require(order.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.total_amount, dec!(33.00));
        assert_eq!(stored.timeline.len(), 1);
        assert_eq!(stored.timeline[0].event_type, "OrderPlaced");
    }

    #[tokio::test]
    async fn repeated_confirmation_writes_once() {
        let handler = handler();
        let number = handler.next_order_number().await.unwrap();
        let order = handler.place(place_command(number), None).await.unwrap();

        handler
            .handle(order.id, OrderCommand::AttachPaymentIntent { intent_id: "pi_9".into(), replaces: None }, None)
            .await
            .unwrap();

        let confirm = OrderCommand::ConfirmPayment {
            intent_id: "pi_9".into(),
            source: PaymentSource::Webhook,
        };
        let first = handler.handle(order.id, confirm.clone(), None).await.unwrap();
        let second = handler.handle(order.id, confirm, None).await.unwrap();

        assert!(first.became_paid());
        assert!(!second.changed());
        assert_eq!(second.order.payment_status, PaymentStatus::Paid);
        assert_eq!(second.order.order_status, OrderStatus::Processing);
        assert_eq!(second.order.version, first.order.version);
    }

    #[tokio::test]
    async fn rule_violation_leaves_document_untouched() {
        let handler = handler();
        let number = handler.next_order_number().await.unwrap();
        let order = handler.place(place_command(number), None).await.unwrap();

        let result = handler
            .handle(
                order.id,
                OrderCommand::ConfirmPayment {
                    intent_id: "pi_unknown".into(),
                    source: PaymentSource::Confirmation,
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(OrderHandlerError::Rule(OrderError::IntentMismatch(_)))));
        let stored = handler.orders().require(order.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let result = handler()
            .handle(
                Uuid::new_v4(),
                OrderCommand::UpdateFulfillment { status: OrderStatus::Completed },
                None,
            )
            .await;
        assert!(matches!(result, Err(OrderHandlerError::NotFound(_))));
    }
}
