use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::core::DomainEvent;
use super::value_objects::{OrderItem, OrderOwner, PaymentMethod, PaymentSlip, PaymentSource, ShippingAddress};

// ============================================================================
// Order Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    PaymentIntentAttached(PaymentIntentAttached),
    PaymentSucceeded(PaymentSucceeded),
    PaymentFailed(PaymentFailed),
    PaymentSlipSubmitted(PaymentSlipSubmitted),
    PaymentSlipApproved(PaymentSlipReviewed),
    PaymentSlipRejected(PaymentSlipReviewed),
    FulfillmentStarted(FulfillmentChanged),
    Completed(FulfillmentChanged),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::PaymentIntentAttached(_) => "PaymentIntentAttached",
            OrderEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::PaymentSlipSubmitted(_) => "PaymentSlipSubmitted",
            OrderEvent::PaymentSlipApproved(_) => "PaymentSlipApproved",
            OrderEvent::PaymentSlipRejected(_) => "PaymentSlipRejected",
            OrderEvent::FulfillmentStarted(_) => "FulfillmentStarted",
            OrderEvent::Completed(_) => "OrderCompleted",
        }
    }
}

impl OrderEvent {
    /// Events after which the buyer has paid
    pub fn marks_paid(&self) -> bool {
        matches!(self, OrderEvent::PaymentSucceeded(_) | OrderEvent::PaymentSlipApproved(_))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_number: String,
    pub owner: OrderOwner,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub placed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentAttached {
    pub intent_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSucceeded {
    pub intent_id: String,
    pub source: PaymentSource,
    pub paid_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
    pub intent_id: String,
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSlipSubmitted {
    pub slip: PaymentSlip,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSlipReviewed {
    pub reviewer: Uuid,
    pub notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentChanged {
    pub at: DateTime<Utc>,
}
