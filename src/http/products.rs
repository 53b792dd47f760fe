use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser, Identity};
use crate::domain::product::{Product, ProductChanges};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Collection, Filter, Query, StoreError};

use super::upload::read_image;
use super::Paging;

const RATING_ATTEMPTS: u32 = 2;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("", web::post().to(create_product))
            .route("/{id}", web::get().to(get_product))
            .route("/{id}", web::put().to(update_product))
            .route("/{id}", web::delete().to(deactivate_product))
            .route("/{id}/image", web::post().to(upload_image))
            .route("/{id}/rate", web::post().to(rate_product)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub asset_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateProduct {
    pub rating: i64,
}

async fn list_products(
    state: web::Data<AppState>,
    identity: Identity,
    params: web::Query<ProductQuery>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let (page, limit, skip) = Paging {
        page: params.page,
        limit: params.limit,
    }
    .resolve();

    let mut filters = Vec::new();
    if !(params.include_inactive && identity.is_admin()) {
        filters.push(Filter::eq("active", true));
    }
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        filters.push(Filter::matches(&["name", "description"], q));
    }
    if let Some(category) = params.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        filters.push(Filter::eq("category", category));
    }

    let total = state.products.count(&filters).await?;
    let query = Query {
        filters,
        ..Query::default()
    }
    .newest_first("createdAt")
    .page(skip, limit);
    let products = state.products.find(&query).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "products": products,
        "page": page,
        "limit": limit,
        "total": total,
    })))
}

async fn get_product(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let product = state.products.require(path.into_inner()).await?;
    if !product.active && !identity.is_admin() {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "product": product })))
}

async fn create_product(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    body: web::Json<CreateProduct>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let mut product = Product::new(
        admin.id,
        body.name,
        body.description,
        body.price,
        body.category,
        body.asset_url,
    )?;
    state.products.insert(&mut product).await?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "product created");
    Ok(HttpResponse::Created().json(serde_json::json!({ "product": product })))
}

async fn update_product(
    state: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<ProductChanges>,
) -> Result<HttpResponse, ApiError> {
    let mut product = state.products.require(path.into_inner()).await?;
    if !user.is_admin() && product.owner_id != user.id {
        return Err(ApiError::forbidden("Not allowed to edit this product"));
    }

    product.apply_changes(body.into_inner())?;
    state.products.save(&mut product).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "product": product })))
}

async fn deactivate_product(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let mut product = state.products.require(path.into_inner()).await?;
    product.apply_changes(ProductChanges {
        active: Some(false),
        ..ProductChanges::default()
    })?;
    state.products.save(&mut product).await?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "product deactivated");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Product deactivated",
        "product": product,
    })))
}

async fn upload_image(
    state: web::Data<AppState>,
    AdminUser(_admin): AdminUser,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut product = state.products.require(path.into_inner()).await?;
    let image = read_image(payload, "image").await?;

    let key = format!(
        "products/{}-{}.{}",
        product.id,
        Utc::now().timestamp_millis(),
        image.extension
    );
    let stored = state.storage.put(&key, image.bytes, image.content_type).await?;

    product.image_url = Some(stored.url);
    product.updated_at = Utc::now();
    state.products.save(&mut product).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "product": product })))
}

async fn rate_product(
    state: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<RateProduct>,
) -> Result<HttpResponse, ApiError> {
    let product = record_rating(&state.products, path.into_inner(), body.rating).await?;

    tracing::debug!(product_id = %product.id, user_id = %user.id, rating = body.rating, "product rated");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "rating": product.rating })))
}

/// Read-modify-write, reapplied once on a version conflict. If the second
/// write also loses, the rating is dropped and the current product returned.
async fn record_rating(products: &Collection<Product>, id: Uuid, rating: i64) -> Result<Product, ApiError> {
    for attempt in 1..=RATING_ATTEMPTS {
        let mut product = products.require(id).await?;
        product.ensure_purchasable()?;
        product.rating.record(rating)?;

        match products.save(&mut product).await {
            Ok(()) => return Ok(product),
            Err(StoreError::Conflict { .. }) if attempt < RATING_ATTEMPTS => {
                tracing::debug!(product_id = %id, "concurrent rating, reapplying");
            }
            Err(StoreError::Conflict { .. }) => {
                tracing::warn!(product_id = %id, rating, "rating dropped after repeated conflicts");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(products.require(id).await?)
}
