// ============================================================================
// User Domain - accounts, roles and credentials
// ============================================================================

pub mod errors;
pub mod model;

pub use errors::*;
pub use model::*;
