// ============================================================================
// Payments - card payments through an external gateway
// ============================================================================
//
// - gateway:   PaymentGateway port, intent and webhook types
// - signature: HMAC-SHA256 webhook verification
// - stripe:    HTTP gateway (Stripe-compatible REST API)
// - fake:      in-process gateway for development and tests
// - service:   PaymentService, drives the order state machine
//
// ============================================================================

mod fake;
mod gateway;
mod service;
mod signature;
mod stripe;

pub use fake::FakeGateway;
pub use gateway::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent, WebhookData,
    WebhookEvent,
};
pub use service::{IntentCreated, PaymentError, PaymentService, WebhookOutcome, INTENT_FAILED, INTENT_SUCCEEDED};
pub use signature::WebhookVerifier;
pub use stripe::{StripeGateway, DEFAULT_API_BASE};
