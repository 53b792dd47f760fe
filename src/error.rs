use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::auth::AuthError;
use crate::domain::contact::ContactError;
use crate::domain::order::{OrderError, OrderHandlerError};
use crate::domain::product::ProductError;
use crate::domain::user::UserError;
use crate::payments::{GatewayError, PaymentError};
use crate::storage::StorageError;
use crate::store::StoreError;

// ============================================================================
// API Error - maps every layer's error onto an HTTP status
// ============================================================================
//
// Body is always `{"message": "..."}`. Internal details are logged and
// replaced by a generic message in 500 responses.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({ "message": message }))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { collection, .. } => {
                ApiError::NotFound(format!("{} not found", singular(&collection)))
            }
            StoreError::AlreadyExists { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<OrderHandlerError> for ApiError {
    fn from(e: OrderHandlerError) -> Self {
        match e {
            OrderHandlerError::Rule(rule) => rule.into(),
            OrderHandlerError::NotFound(_) => ApiError::NotFound("Order not found".into()),
            OrderHandlerError::Store(store) => store.into(),
        }
    }
}

impl From<ProductError> for ApiError {
    fn from(e: ProductError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::InvalidCredentials => ApiError::Unauthorized(e.to_string()),
            UserError::Inactive => ApiError::Forbidden(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(e: ContactError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::Expired => {
                ApiError::Unauthorized(e.to_string())
            }
            AuthError::Forbidden => ApiError::Forbidden(e.to_string()),
            AuthError::Hashing(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidSignature(_) | GatewayError::MalformedPayload(_) => {
                ApiError::BadRequest(format!("Webhook error: {e}"))
            }
            GatewayError::IntentNotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Gateway(gateway) => gateway.into(),
            PaymentError::Order(order) => order.into(),
            PaymentError::UnknownIntent(_) => ApiError::NotFound(e.to_string()),
            PaymentError::Money(_)
            | PaymentError::NotSucceeded(_)
            | PaymentError::AmountMismatch { .. } => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

fn singular(collection: &str) -> &str {
    match collection {
        "orders" => "Order",
        "products" => "Product",
        "users" => "User",
        other => other,
    }
}
