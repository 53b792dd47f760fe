// ============================================================================
// Storefront - e-commerce backend
// ============================================================================
//
// Structure:
// - domain/   - aggregates and business rules (orders, products, users)
// - store/    - document persistence (in-memory, Postgres/JSONB)
// - payments/ - payment gateway port, HTTP client, webhook verification
// - storage/  - object storage for uploaded images
// - mail/     - transactional email, delivered by actors::MailerActor
// - auth/     - password hashing, bearer tokens, request identity
// - http/     - REST routes, uploads, rate limiting
// - metrics/  - Prometheus registry, /metrics and /health
// - utils/    - circuit breaker, retry with backoff
//
// ============================================================================

pub mod actors;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod mail;
pub mod metrics;
pub mod payments;
pub mod state;
pub mod storage;
pub mod store;
pub mod utils;
