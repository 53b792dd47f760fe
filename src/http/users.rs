use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::domain::user::{validate_password, UserError};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Filter, Query};

use super::auth::{hash_blocking, verify_blocking};
use super::OrderView;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/profile", web::get().to(profile))
            .route("/profile", web::put().to(update_profile))
            .route("/orders", web::get().to(my_orders)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

async fn profile(AuthUser(user): AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "user": user.public() }))
}

async fn update_profile(
    state: web::Data<AppState>,
    AuthUser(mut user): AuthUser,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, ApiError> {
    let update = body.into_inner();

    if let Some(name) = &update.name {
        user.rename(name)?;
    }

    if let Some(new_password) = update.new_password {
        let current = update
            .current_password
            .ok_or_else(|| ApiError::bad_request("Current password is required"))?;
        if !verify_blocking(current, user.password_hash.clone()).await? {
            return Err(UserError::InvalidCredentials.into());
        }
        validate_password(&new_password)?;
        user.password_hash = hash_blocking(new_password).await?;
        user.updated_at = chrono::Utc::now();
    }

    state.users.save(&mut user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": user.public() })))
}

async fn my_orders(
    state: web::Data<AppState>,
    AuthUser(user): AuthUser,
) -> Result<HttpResponse, ApiError> {
    let query = Query::new()
        .filter(Filter::eq("owner.userId", user.id.to_string()))
        .newest_first("createdAt");
    let orders = state.orders.orders().find(&query).await?;

    let views: Vec<OrderView> = orders.iter().map(OrderView::from).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "orders": views })))
}
