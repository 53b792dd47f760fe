// ============================================================================
// Order Domain - placement, payment and fulfillment
// ============================================================================
//
// - Value objects (OrderItem, OrderOwner, statuses)
// - Events (OrderPlaced, PaymentSucceeded, ...)
// - Commands (PlaceOrder, ConfirmPayment, ReviewPaymentSlip, ...)
// - Errors (OrderError)
// - Aggregate (Order, the state machine)
// - Command Handler (OrderCommandHandler, persistence + retry on conflict)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
