use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::core::{Aggregate, EventEnvelope};
use crate::store::Entity;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::*;

// ============================================================================
// Order Aggregate - payment and fulfillment state machine
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub order_number: String,

    // Contents, fixed at placement
    pub owner: OrderOwner,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,

    // Payment
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub payment_slip: Option<PaymentSlip>,
    pub payment_notes: Option<String>,
    pub payment_reviewed_by: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,

    // Fulfillment
    pub order_status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub timeline: Vec<EventEnvelope<OrderEvent>>,
}

impl Order {
    pub fn lifecycle_stage(&self) -> LifecycleStage {
        match (self.payment_status, self.order_status) {
            (_, OrderStatus::Completed) => LifecycleStage::Completed,
            (_, OrderStatus::Processing) => LifecycleStage::Processing,
            (PaymentStatus::Paid, OrderStatus::Pending) => LifecycleStage::Paid,
            (PaymentStatus::Failed, _) => LifecycleStage::Failed,
            (PaymentStatus::Pending, OrderStatus::Pending) => {
                let payment_started = match self.payment_method {
                    PaymentMethod::Card => self.payment_intent_id.is_some(),
                    PaymentMethod::BankTransfer => self.payment_slip.is_some(),
                };
                if payment_started {
                    LifecycleStage::AwaitingPayment
                } else {
                    LifecycleStage::Created
                }
            }
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner.user_id() == Some(user_id)
    }

    /// Sum of captured line totals
    pub fn computed_total(items: &[OrderItem]) -> Result<Decimal, OrderError> {
        items.iter().try_fold(Decimal::ZERO, |total, item| {
            item.line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or(OrderError::TotalOutOfRange)
        })
    }

    fn require_method(&self, method: PaymentMethod) -> Result<(), OrderError> {
        if self.payment_method == method {
            Ok(())
        } else {
            Err(OrderError::WrongPaymentMethod(self.payment_method))
        }
    }

    fn require_intent(&self, intent_id: &str) -> Result<(), OrderError> {
        match &self.payment_intent_id {
            Some(current) if current == intent_id => Ok(()),
            _ => Err(OrderError::IntentMismatch(intent_id.to_string())),
        }
    }

    /// A slip can be (re)submitted until an admin has decided on it
    pub fn ensure_slip_open(&self) -> Result<(), OrderError> {
        match self.payment_status {
            PaymentStatus::Paid => Err(OrderError::AlreadyPaid),
            PaymentStatus::Failed if self.payment_reviewed_by.is_some() => {
                Err(OrderError::AlreadyReviewed(PaymentStatus::Failed))
            }
            _ => Ok(()),
        }
    }

    fn fulfillment_started(&self, now: DateTime<Utc>) -> Option<OrderEvent> {
        (self.order_status == OrderStatus::Pending)
            .then(|| OrderEvent::FulfillmentStarted(FulfillmentChanged { at: now }))
    }

    fn validate_placement(
        owner: &OrderOwner,
        items: &[OrderItem],
        shipping_address: &ShippingAddress,
    ) -> Result<(), OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in items {
            if item.quantity == 0 || item.quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::InvalidQuantity {
                    product: item.name.clone(),
                    quantity: item.quantity,
                });
            }
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(OrderError::InvalidPrice(item.name.clone()));
            }
        }

        if let Some(field) = shipping_address.missing_field() {
            return Err(OrderError::IncompleteAddress(field));
        }

        if let OrderOwner::Guest(guest) = owner {
            if guest.name.trim().is_empty() || !guest.email.contains('@') {
                return Err(OrderError::IncompleteGuestInfo);
            }
        }

        Ok(())
    }
}

impl Entity for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn handle_create(command: &Self::Command) -> Result<Self::Event, Self::Error> {
        match command {
            OrderCommand::PlaceOrder {
                order_number,
                owner,
                items,
                shipping_address,
                payment_method,
            } => {
                Self::validate_placement(owner, items, shipping_address)?;

                Ok(OrderEvent::Placed(OrderPlaced {
                    order_number: order_number.clone(),
                    owner: owner.clone(),
                    items: items.clone(),
                    total_amount: Self::computed_total(items)?,
                    shipping_address: shipping_address.clone(),
                    payment_method: *payment_method,
                    placed_at: Utc::now(),
                }))
            }
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_first_event(id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Placed(e) => Ok(Self {
                id,
                version: 0,
                order_number: e.order_number.clone(),
                owner: e.owner.clone(),
                items: e.items.clone(),
                total_amount: e.total_amount,
                shipping_address: e.shipping_address.clone(),
                payment_method: e.payment_method,
                payment_status: PaymentStatus::Pending,
                payment_intent_id: None,
                payment_slip: None,
                payment_notes: None,
                payment_reviewed_by: None,
                paid_at: None,
                order_status: OrderStatus::Pending,
                created_at: e.placed_at,
                updated_at: e.placed_at,
                timeline: Vec::new(),
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        self.updated_at = Utc::now();

        match event {
            OrderEvent::Placed(_) => return Err(OrderError::AlreadyPlaced),
            OrderEvent::PaymentIntentAttached(e) => {
                self.payment_intent_id = Some(e.intent_id.clone());
            }
            OrderEvent::PaymentSucceeded(e) => {
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(e.paid_at);
            }
            OrderEvent::PaymentFailed(e) => {
                self.payment_status = PaymentStatus::Failed;
                self.payment_notes = e.reason.clone();
            }
            OrderEvent::PaymentSlipSubmitted(e) => {
                self.payment_status = PaymentStatus::Pending;
                self.payment_slip = Some(e.slip.clone());
                self.payment_notes = None;
                self.payment_reviewed_by = None;
            }
            OrderEvent::PaymentSlipApproved(e) => {
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(e.reviewed_at);
                self.payment_notes = e.notes.clone();
                self.payment_reviewed_by = Some(e.reviewer);
            }
            OrderEvent::PaymentSlipRejected(e) => {
                self.payment_status = PaymentStatus::Failed;
                self.payment_notes = e.notes.clone();
                self.payment_reviewed_by = Some(e.reviewer);
            }
            OrderEvent::FulfillmentStarted(_) => {
                self.order_status = OrderStatus::Processing;
            }
            OrderEvent::Completed(_) => {
                self.order_status = OrderStatus::Completed;
            }
        }

        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let now = Utc::now();

        match command {
            OrderCommand::PlaceOrder { .. } => Err(OrderError::AlreadyPlaced),

            OrderCommand::AttachPaymentIntent { intent_id, replaces } => {
                self.require_method(PaymentMethod::Card)?;
                if self.payment_status == PaymentStatus::Paid {
                    return Err(OrderError::AlreadyPaid);
                }

                match &self.payment_intent_id {
                    Some(current) if current == intent_id => Ok(vec![]),
                    // Never drop an intent the caller did not know about: its
                    // client secret may already be with the buyer
                    Some(current) if replaces.as_deref() != Some(current.as_str()) => {
                        Err(OrderError::IntentAlreadyAttached(current.clone()))
                    }
                    _ => Ok(vec![OrderEvent::PaymentIntentAttached(PaymentIntentAttached {
                        intent_id: intent_id.clone(),
                    })]),
                }
            }

            OrderCommand::ConfirmPayment { intent_id, source } => {
                self.require_method(PaymentMethod::Card)?;
                self.require_intent(intent_id)?;

                // Redelivery or a second confirmation: nothing left to do
                if self.payment_status == PaymentStatus::Paid {
                    return Ok(vec![]);
                }

                let mut events = vec![OrderEvent::PaymentSucceeded(PaymentSucceeded {
                    intent_id: intent_id.clone(),
                    source: *source,
                    paid_at: now,
                })];
                events.extend(self.fulfillment_started(now));
                Ok(events)
            }

            OrderCommand::FailPayment { intent_id, reason } => {
                self.require_method(PaymentMethod::Card)?;
                self.require_intent(intent_id)?;

                match self.payment_status {
                    PaymentStatus::Pending => Ok(vec![OrderEvent::PaymentFailed(PaymentFailed {
                        intent_id: intent_id.clone(),
                        reason: reason.clone(),
                    })]),
                    // Never regress a paid order; repeated failures are no-ops
                    PaymentStatus::Paid | PaymentStatus::Failed => Ok(vec![]),
                }
            }

            OrderCommand::SubmitPaymentSlip { slip } => {
                self.require_method(PaymentMethod::BankTransfer)?;
                self.ensure_slip_open()?;

                Ok(vec![OrderEvent::PaymentSlipSubmitted(PaymentSlipSubmitted {
                    slip: slip.clone(),
                })])
            }

            OrderCommand::ReviewPaymentSlip { approved, notes, reviewer } => {
                self.require_method(PaymentMethod::BankTransfer)?;
                if self.payment_slip.is_none() {
                    return Err(OrderError::NoPaymentSlip);
                }
                if self.payment_status != PaymentStatus::Pending {
                    return Err(OrderError::AlreadyReviewed(self.payment_status));
                }

                let review = PaymentSlipReviewed {
                    reviewer: *reviewer,
                    notes: notes.clone(),
                    reviewed_at: now,
                };

                if *approved {
                    let mut events = vec![OrderEvent::PaymentSlipApproved(review)];
                    events.extend(self.fulfillment_started(now));
                    Ok(events)
                } else {
                    Ok(vec![OrderEvent::PaymentSlipRejected(review)])
                }
            }

            OrderCommand::UpdateFulfillment { status } => {
                let invalid = OrderError::InvalidStatusTransition {
                    from: self.order_status,
                    to: *status,
                };

                match (self.order_status, status) {
                    (current, target) if current == *target => Ok(vec![]),
                    (OrderStatus::Pending, OrderStatus::Processing) => {
                        if self.payment_status != PaymentStatus::Paid {
                            return Err(OrderError::NotPaid);
                        }
                        Ok(vec![OrderEvent::FulfillmentStarted(FulfillmentChanged { at: now })])
                    }
                    (OrderStatus::Processing, OrderStatus::Completed) => {
                        Ok(vec![OrderEvent::Completed(FulfillmentChanged { at: now })])
                    }
                    _ => Err(invalid),
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
