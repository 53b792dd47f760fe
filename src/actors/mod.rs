// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, best-effort work.
//
// Note: Domain logic (Order, Product, ...) uses command handlers, NOT actors.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

mod mailer;

pub use mailer::{MailerActor, SendEmail};
