// ============================================================================
// Product Domain - catalog entries and ratings
// ============================================================================

pub mod errors;
pub mod model;

pub use errors::*;
pub use model::*;
