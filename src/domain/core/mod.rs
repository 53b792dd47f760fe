// ============================================================================
// Domain Core - generic abstractions shared by aggregates
// ============================================================================

pub mod aggregate;
pub mod event;
pub mod money;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope};
pub use money::{to_minor_units, MoneyError};
