use super::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    EmptyItems,

    #[error("Invalid quantity {quantity} for product {product}")]
    InvalidQuantity { product: String, quantity: u32 },

    #[error("Invalid price for product {0}")]
    InvalidPrice(String),

    #[error("Shipping address is missing {0}")]
    IncompleteAddress(&'static str),

    #[error("Guest name and email are required")]
    IncompleteGuestInfo,

    #[error("Operation not available for {0:?} orders")]
    WrongPaymentMethod(PaymentMethod),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Payment intent {0} does not belong to this order")]
    IntentMismatch(String),

    #[error("Payment intent {0} is already attached to this order")]
    IntentAlreadyAttached(String),

    #[error("Order total is out of range")]
    TotalOutOfRange,

    #[error("Order has no payment slip to review")]
    NoPaymentSlip,

    #[error("Payment was already reviewed ({0:?})")]
    AlreadyReviewed(PaymentStatus),

    #[error("Order must be paid before fulfillment")]
    NotPaid,

    #[error("Cannot move order from {from:?} to {to:?}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order has already been placed")]
    AlreadyPlaced,

    #[error("Order must be placed before other commands")]
    NotInitialized,
}
