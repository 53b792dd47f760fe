// ============================================================================
// Product Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProductError {
    #[error("Product name cannot be empty")]
    EmptyName,

    #[error("Product category cannot be empty")]
    EmptyCategory,

    #[error("Price must not be negative")]
    NegativePrice,

    #[error("Price must not exceed {max}", max = super::model::MAX_PRICE)]
    PriceTooHigh,

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("Product is not available")]
    Inactive,
}
