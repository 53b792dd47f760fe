// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory. Nothing here knows about HTTP or
// about a particular storage backend.
//
// ============================================================================

pub mod core;
pub mod order;
pub mod product;
pub mod user;
pub mod contact;
