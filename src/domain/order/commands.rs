use uuid::Uuid;

use super::value_objects::{OrderItem, OrderOwner, OrderStatus, PaymentMethod, PaymentSlip, PaymentSource, ShippingAddress};

// ============================================================================
// Order Commands - intent, validated by the aggregate
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    PlaceOrder {
        order_number: String,
        owner: OrderOwner,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    },
    /// `replaces` is the intent the caller saw on the order; a different
    /// attached intent means another request won the race
    AttachPaymentIntent {
        intent_id: String,
        replaces: Option<String>,
    },
    ConfirmPayment {
        intent_id: String,
        source: PaymentSource,
    },
    FailPayment {
        intent_id: String,
        reason: Option<String>,
    },
    SubmitPaymentSlip {
        slip: PaymentSlip,
    },
    ReviewPaymentSlip {
        approved: bool,
        notes: Option<String>,
        reviewer: Uuid,
    },
    UpdateFulfillment {
        status: OrderStatus,
    },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::PlaceOrder { .. } => "PlaceOrder",
            OrderCommand::AttachPaymentIntent { .. } => "AttachPaymentIntent",
            OrderCommand::ConfirmPayment { .. } => "ConfirmPayment",
            OrderCommand::FailPayment { .. } => "FailPayment",
            OrderCommand::SubmitPaymentSlip { .. } => "SubmitPaymentSlip",
            OrderCommand::ReviewPaymentSlip { .. } => "ReviewPaymentSlip",
            OrderCommand::UpdateFulfillment { .. } => "UpdateFulfillment",
        }
    }
}
