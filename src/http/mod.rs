// ============================================================================
// HTTP Layer - REST routes grouped by resource
// ============================================================================
//
// Handlers stay thin: extract identity and input, call the domain or a
// service, map errors through ApiError. Every error body is
// `{"message": "..."}`.
//
// ============================================================================

mod admin;
mod auth;
mod contact;
mod orders;
mod payments;
mod products;
pub mod rate_limit;
mod upload;
mod users;

use actix_web::{error, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::domain::order::{LifecycleStage, Order};
use crate::error::ApiError;
use crate::metrics::{health_handler, metrics_handler};

pub use upload::{ImageUpload, MAX_UPLOAD_BYTES};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Register every route and the extractor error handlers
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(1024 * 1024)
            .error_handler(|err, _req| extractor_error(err.to_string())),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| extractor_error(err.to_string())))
    .app_data(web::PathConfig::default().error_handler(|err, _req| extractor_error(err.to_string())))
    .configure(auth::routes)
    .configure(users::routes)
    .configure(products::routes)
    .configure(orders::routes)
    .configure(payments::routes)
    .configure(admin::routes)
    .configure(contact::routes)
    .route("/metrics", web::get().to(metrics_handler))
    .route("/health", web::get().to(health_handler))
    .default_service(web::to(not_found));
}

fn extractor_error(message: String) -> error::Error {
    ApiError::BadRequest(message).into()
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    Err(ApiError::not_found(format!("Route {} {} not found", req.method(), req.path())))
}

/// `?page=&limit=` with defaults and an upper bound on page size
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl Paging {
    /// (page, limit, skip)
    pub fn resolve(&self) -> (usize, usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit, (page - 1) * limit)
    }
}

/// Order as returned by the API: the stored document plus its derived stage
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView<'a> {
    #[serde(flatten)]
    pub order: &'a Order,
    pub lifecycle_stage: LifecycleStage,
}

impl<'a> From<&'a Order> for OrderView<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            order,
            lifecycle_stage: order.lifecycle_stage(),
        }
    }
}
